//! Lexer for the single command line printed by the build driver's
//! `--just-print` run rule.
//!
//! Recognizes whitespace-separated tokens and single- or double-quoted
//! segments with backslash escapes inside quotes. The input is assumed to
//! be a well-formed command; an unterminated quote simply consumes the
//! rest of the line.

/// Split one shell-ish command line into an argv vector.
pub fn split_command(s: &str) -> Vec<String> {
    let bytes = s.as_bytes();
    let mut args = Vec::new();
    let mut token: Vec<u8> = Vec::new();
    let mut in_token = false;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            if in_token {
                args.push(String::from_utf8_lossy(&token).into_owned());
                token.clear();
                in_token = false;
            }
            i += 1;
        } else if c == b'"' || c == b'\'' {
            let quote = c;
            in_token = true;
            i += 1;
            while i < bytes.len() && bytes[i] != quote {
                if bytes[i] == b'\\' && i + 1 < bytes.len() {
                    i += 1;
                }
                token.push(bytes[i]);
                i += 1;
            }
            // step past the closing quote
            i += 1;
        } else {
            in_token = true;
            token.push(c);
            i += 1;
        }
    }

    if in_token {
        args.push(String::from_utf8_lossy(&token).into_owned());
    }
    args
}
