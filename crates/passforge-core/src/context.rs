use crate::catalog::PassCatalog;
use crate::error::PfResult;
use crate::eval::TuningError;
use crate::replay::ReplayClient;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// Build a full executable and time the program's run rule.
    Local,
    /// Build a shared library and delegate timing to the replay workers.
    Replay,
}

/// Derive `<base><suffix>` next to the input file, e.g. `X.bc.tuning-log`.
pub fn sibling_path(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Append-only trace and error sinks next to the bitcode file.
///
/// Pool workers write concurrently; each sink is serialized by its mutex.
pub struct LogSinks {
    log: Mutex<File>,
    err: Mutex<File>,
}

impl LogSinks {
    pub fn create(bitcode: &Path) -> PfResult<Self> {
        let log = File::create(sibling_path(bitcode, ".tuning-log"))?;
        let err = File::create(sibling_path(bitcode, ".tuning-err"))?;
        Ok(Self {
            log: Mutex::new(log),
            err: Mutex::new(err),
        })
    }

    pub fn trace(&self, line: &str) {
        if let Ok(mut f) = self.log.lock() {
            let _ = writeln!(f, "{line}");
        }
    }

    pub fn error(&self, record: &str) {
        if let Ok(mut f) = self.err.lock() {
            let _ = writeln!(f, "{record}");
        }
    }
}

/// Everything an evaluation needs, bundled once in `main` and threaded
/// through the search, pool and evaluator explicitly.
pub struct TuneContext {
    pub catalog: PassCatalog,
    pub bitcode: PathBuf,
    pub makefile: String,
    pub exe_var: String,
    pub bc_var: String,
    pub obj_var: String,
    pub run_rule: String,
    pub verify_rule: String,
    pub mode: EvalMode,
    pub workers: usize,
    pub compiler_timeout: Duration,
    pub opt_cmd: String,
    pub llc_cmd: String,
    pub make_cmd: String,
    pub replay: Option<ReplayClient>,
    pub logs: LogSinks,
}

impl TuneContext {
    pub fn log_line(&self, line: &str) {
        self.logs.trace(line);
    }

    pub fn log_error(&self, err: &TuningError) {
        self.logs
            .error(&format!("file: {}\n{}", self.bitcode.display(), err));
    }

    /// Send each replay worker its kill byte. Called exactly once, at
    /// process termination. No-op in local mode.
    pub fn shutdown_replay(&self) {
        if let Some(client) = &self.replay {
            client.shutdown();
        }
    }
}
