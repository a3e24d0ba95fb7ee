//! The evaluation pipeline: configuration in, measured run time out.
//!
//! Every failure mode is classified, written to the error sink and
//! collapsed into `MAX_ELAPSED` at this boundary; the search engines only
//! ever see elapsed times.

use crate::candidate::Candidate;
use crate::context::{EvalMode, TuneContext};
use crate::lexer::split_command;
use crate::process::run_command;
use crate::scratch::Scratch;
use std::fmt;
use std::fs;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

/// Sentinel for a failed or timed-out evaluation; worst in the total
/// order, absorbing for best-so-far comparisons.
pub const MAX_ELAPSED: Duration = Duration::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The optimizer crashed or timed out.
    OptError,
    /// Lowering or linking failed.
    CodegenError,
    /// Extracting the run command from the build driver failed.
    BuildError,
    /// The program crashed, timed out, or its output failed verification.
    IncorrectCode,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self {
            FailureReason::OptError => "opt crash",
            FailureReason::CodegenError => "llc crash",
            FailureReason::BuildError => "build error",
            FailureReason::IncorrectCode => "opt/llc generated incorrect code",
        };
        f.write_str(what)
    }
}

/// An evaluation failure: which configuration, which stage, and the
/// tool's own diagnostics. Written to the error sink, never surfaced to
/// the search.
#[derive(Debug)]
pub struct TuningError {
    pub config: String,
    pub reason: FailureReason,
    pub detail: String,
}

impl fmt::Display for TuningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config: {}\nwhat: {}\ndetail:\n{}\n================================",
            self.config, self.reason, self.detail
        )
    }
}

pub struct Evaluator {
    ctx: Arc<TuneContext>,
}

impl Evaluator {
    pub fn new(ctx: Arc<TuneContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &TuneContext {
        &self.ctx
    }

    /// Evaluate, collapsing any failure into `MAX_ELAPSED` after logging.
    pub fn measure(&self, cand: &Candidate, timeout: Option<Duration>) -> Duration {
        match self.evaluate(cand, timeout) {
            Ok(elapsed) => elapsed,
            Err(err) => {
                self.ctx.log_error(&err);
                MAX_ELAPSED
            }
        }
    }

    pub fn evaluate(
        &self,
        cand: &Candidate,
        timeout: Option<Duration>,
    ) -> Result<Duration, TuningError> {
        self.evaluate_as(cand, timeout, self.ctx.mode)
    }

    /// Evaluate under an explicit mode. The annealer's checkpoint uses
    /// this to re-run a replay-promoted best through the full local
    /// pipeline.
    pub fn evaluate_as(
        &self,
        cand: &Candidate,
        timeout: Option<Duration>,
        mode: EvalMode,
    ) -> Result<Duration, TuningError> {
        match mode {
            EvalMode::Local => self.run_local(cand, timeout),
            EvalMode::Replay => self.run_replay(cand),
        }
    }

    /// `opt` the bitcode under the candidate's flags into a scratch file.
    fn optimize(&self, cand: &Candidate) -> Result<Scratch, TuningError> {
        let ctx = &self.ctx;
        let optbc = Scratch::new();
        let mut cmd = Command::new(&ctx.opt_cmd);
        cmd.args(cand.as_args(&ctx.catalog))
            .arg(&ctx.bitcode)
            .arg("-o")
            .arg(optbc.path());
        run_command(cmd, Some(ctx.compiler_timeout))
            .map_err(|e| self.fail(cand, FailureReason::OptError, e))?;
        Ok(optbc)
    }

    fn make(&self) -> Command {
        let mut cmd = Command::new(&self.ctx.make_cmd);
        cmd.arg("-f").arg(&self.ctx.makefile);
        cmd
    }

    fn run_local(
        &self,
        cand: &Candidate,
        timeout: Option<Duration>,
    ) -> Result<Duration, TuningError> {
        let ctx = &self.ctx;
        let optbc = self.optimize(cand)?;

        let exe = Scratch::new();
        let mut cmd = self.make();
        cmd.arg(format!("{}={}", ctx.exe_var, exe.path().display()))
            .arg(format!("{}={}", ctx.bc_var, optbc.path().display()))
            .arg(exe.path());
        run_command(cmd, None).map_err(|e| self.fail(cand, FailureReason::CodegenError, e))?;

        // Ask the driver what command it would use to launch the program,
        // then run it ourselves so CPU time can be measured.
        let out = Scratch::new();
        let mut cmd = self.make();
        cmd.arg(format!("OUT={}", out.path().display()))
            .arg(format!("{}={}", ctx.exe_var, exe.path().display()))
            .arg(&ctx.run_rule)
            .arg("--just-print");
        let printed =
            run_command(cmd, None).map_err(|e| self.fail(cand, FailureReason::BuildError, e))?;

        let argv = split_command(&String::from_utf8_lossy(&printed.output));
        if argv.is_empty() {
            return Err(self.fail(
                cand,
                FailureReason::BuildError,
                "run rule printed no command",
            ));
        }
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        let run = run_command(cmd, timeout)
            .map_err(|e| self.fail(cand, FailureReason::IncorrectCode, e))?;
        let elapsed = run.cpu_time;

        // Persist the captured stdout so the verify rule can inspect it.
        let stdout_f = Scratch::new();
        fs::write(stdout_f.path(), &run.output)
            .map_err(|e| self.fail(cand, FailureReason::IncorrectCode, e))?;

        let mut cmd = self.make();
        cmd.arg(format!("OUT={}", out.path().display()))
            .arg(format!("STDOUT={}", stdout_f.path().display()))
            .arg(format!("{}={}", ctx.exe_var, exe.path().display()))
            .arg(&ctx.verify_rule);
        run_command(cmd, None).map_err(|e| self.fail(cand, FailureReason::IncorrectCode, e))?;

        Ok(elapsed)
    }

    fn run_replay(&self, cand: &Candidate) -> Result<Duration, TuningError> {
        let ctx = &self.ctx;
        let optbc = self.optimize(cand)?;

        let obj = Scratch::new();
        let mut cmd = Command::new(&ctx.llc_cmd);
        cmd.arg("-filetype=obj")
            .arg("-relocation-model=pic")
            .arg(optbc.path())
            .arg("-o")
            .arg(obj.path());
        run_command(cmd, Some(ctx.compiler_timeout))
            .map_err(|e| self.fail(cand, FailureReason::CodegenError, e))?;
        drop(optbc);

        let lib = Scratch::new();
        let mut cmd = self.make();
        cmd.arg(format!("{}={}", ctx.obj_var, obj.path().display()))
            .arg(format!("LIB={}", lib.path().display()))
            .arg(lib.path());
        run_command(cmd, None).map_err(|e| self.fail(cand, FailureReason::CodegenError, e))?;

        let client = ctx
            .replay
            .as_ref()
            .expect("replay mode configured without a replay client");
        client
            .measure(lib.path())
            .map_err(|e| self.fail(cand, FailureReason::IncorrectCode, e))
    }

    fn fail(
        &self,
        cand: &Candidate,
        reason: FailureReason,
        detail: impl fmt::Display,
    ) -> TuningError {
        TuningError {
            config: cand.render_line(&self.ctx.catalog),
            reason,
            detail: detail.to_string(),
        }
    }
}
