#![allow(dead_code)]

use passforge_core::catalog::PassCatalog;
use passforge_core::context::{sibling_path, EvalMode, LogSinks, TuneContext};
use passforge_core::eval::Evaluator;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A sandbox with a fake bitcode file and stub toolchain scripts standing
/// in for `opt` and the build driver.
pub struct Fixture {
    pub dir: TempDir,
    pub bitcode: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create fixture dir");
        let bitcode = dir.path().join("prog.bc");
        fs::write(&bitcode, b"fake bitcode").unwrap();
        Self { dir, bitcode }
    }

    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    pub fn context(
        &self,
        opt: &Path,
        make: &Path,
        passes: &str,
        workers: usize,
    ) -> Arc<TuneContext> {
        self.context_with(opt, Path::new("llc"), make, passes, workers, EvalMode::Local, None)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn context_with(
        &self,
        opt: &Path,
        llc: &Path,
        make: &Path,
        passes: &str,
        workers: usize,
        mode: EvalMode,
        replay: Option<passforge_core::replay::ReplayClient>,
    ) -> Arc<TuneContext> {
        Arc::new(TuneContext {
            catalog: PassCatalog::parse(passes).unwrap(),
            bitcode: self.bitcode.clone(),
            makefile: "Makefile".into(),
            exe_var: "EXE".into(),
            bc_var: "BC".into(),
            obj_var: "OBJ".into(),
            run_rule: "run".into(),
            verify_rule: "verify".into(),
            mode,
            workers,
            compiler_timeout: Duration::from_secs(30),
            opt_cmd: opt.display().to_string(),
            llc_cmd: llc.display().to_string(),
            make_cmd: make.display().to_string(),
            replay,
            logs: LogSinks::create(&self.bitcode).unwrap(),
        })
    }

    pub fn evaluator(
        &self,
        opt: &Path,
        make: &Path,
        passes: &str,
        workers: usize,
    ) -> Evaluator {
        Evaluator::new(self.context(opt, make, passes, workers))
    }

    pub fn err_log(&self) -> String {
        fs::read_to_string(sibling_path(&self.bitcode, ".tuning-err")).unwrap_or_default()
    }

    pub fn tuning_log(&self) -> String {
        fs::read_to_string(sibling_path(&self.bitcode, ".tuning-log")).unwrap_or_default()
    }
}

/// Stub `opt`: dumps its argv, one argument per line, into the file named
/// by the final `-o`. Downstream stubs can then branch on the flags the
/// candidate rendered.
pub const OPT_OK: &str = r#"#!/bin/sh
out=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
[ -n "$out" ] || exit 1
printf '%s\n' "$@" > "$out"
"#;

/// Stub `opt` that crashes whenever the given flag appears in its argv.
pub fn opt_poisoned(flag: &str) -> String {
    format!(
        r#"#!/bin/sh
out=""
prev=""
for a in "$@"; do
  if [ "$a" = "{flag}" ]; then echo "unknown pass {flag}" >&2; exit 1; fi
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
[ -n "$out" ] || exit 1
printf '%s\n' "$@" > "$out"
"#
    )
}

/// Stub build driver. Parses the variable overrides the evaluator passes
/// and dispatches on the requested target; the three hook strings are
/// spliced in as the recipe bodies.
pub fn make_stub(build: &str, run_print: &str, verify: &str) -> String {
    format!(
        r#"#!/bin/sh
skip=0
target=""
EXE=""; BC=""; OBJ=""; LIB=""; OUT=""; STDOUT=""
for a in "$@"; do
  if [ "$skip" = 1 ]; then skip=0; continue; fi
  case "$a" in
    -f) skip=1 ;;
    --just-print) ;;
    EXE=*) EXE="${{a#EXE=}}" ;;
    BC=*) BC="${{a#BC=}}" ;;
    OBJ=*) OBJ="${{a#OBJ=}}" ;;
    LIB=*) LIB="${{a#LIB=}}" ;;
    OUT=*) OUT="${{a#OUT=}}" ;;
    STDOUT=*) STDOUT="${{a#STDOUT=}}" ;;
    *) target="$a" ;;
  esac
done

case "$target" in
  run)
    {run_print}
    ;;
  verify)
    {verify}
    ;;
  *)
    {build}
    ;;
esac
"#
    )
}

/// A driver whose program runs instantly and always verifies.
pub fn make_trivial() -> String {
    make_stub(":", "echo true", ":")
}
