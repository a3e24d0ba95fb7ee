use crate::error::{PassForgeError, PfResult};
use std::fs;
use std::path::Path;

pub const OPTS_FILENAME: &str = "opts.txt";

/// The ordered list of optimization pass names available to the search.
///
/// Loaded once at startup; the search only ever sees indices into it.
/// Index `len()` is reserved for the verification checkpoint and renders
/// as `-verify` instead of a pass flag.
#[derive(Debug, Clone)]
pub struct PassCatalog {
    names: Vec<String>,
}

impl PassCatalog {
    pub fn load(path: impl AsRef<Path>) -> PfResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> PfResult<Self> {
        let names: Vec<String> = text.split_whitespace().map(str::to_owned).collect();
        if names.is_empty() {
            return Err(PassForgeError::Catalog("no passes listed".into()));
        }
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index of the verification checkpoint pseudo-pass.
    pub fn sentinel(&self) -> usize {
        self.names.len()
    }

    /// Command-line flag for the pass at `idx`.
    pub fn flag(&self, idx: usize) -> String {
        if idx == self.sentinel() {
            "-verify".to_string()
        } else {
            format!("-{}", self.names[idx])
        }
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }
}
