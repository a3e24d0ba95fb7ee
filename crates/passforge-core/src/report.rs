//! Final measurement of the winning pipeline against the vendor default.

use crate::candidate::{Candidate, Pipeline};
use crate::context::EvalMode;
use crate::eval::Evaluator;
use crate::pool::{EvalPool, EvalResult};
use std::time::Duration;
use tracing::info;

/// Repetitions per side when comparing against the baseline.
pub const SPEEDUP_REPS: usize = 10;

/// Mean with the single fastest and single slowest sample discarded.
pub fn trimmed_mean(samples: &[Duration]) -> Duration {
    if samples.is_empty() {
        return Duration::ZERO;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let central: &[Duration] = if sorted.len() > 2 {
        &sorted[1..sorted.len() - 1]
    } else {
        &sorted
    };
    let total: u128 = central.iter().map(|d| d.as_nanos()).sum();
    let mean = total / central.len() as u128;
    Duration::from_nanos(u64::try_from(mean).unwrap_or(u64::MAX))
}

fn elapsed_of(results: Vec<EvalResult>) -> Vec<Duration> {
    results.into_iter().map(|r| r.elapsed).collect()
}

/// Time the winner and the baseline, and log both with their ratio.
///
/// Local mode averages repeated runs; in replay mode a single evaluation
/// suffices because the client already averages its samples.
pub fn report_speedup(evaluator: &Evaluator, best: &Pipeline) {
    let ctx = evaluator.context();
    let tuned = Candidate::Tuned(best.clone());

    let (best_time, o3_time) = match ctx.mode {
        EvalMode::Local => {
            let pool = EvalPool::new(evaluator, ctx.workers);
            let best_runs = pool.run_all(vec![tuned; SPEEDUP_REPS], None);
            let o3_runs = pool.run_all(vec![Candidate::Baseline; SPEEDUP_REPS], None);
            (
                trimmed_mean(&elapsed_of(best_runs)),
                trimmed_mean(&elapsed_of(o3_runs)),
            )
        }
        EvalMode::Replay => (
            evaluator.measure(&tuned, None),
            evaluator.measure(&Candidate::Baseline, None),
        ),
    };

    ctx.log_line(&format!("best time: {best_time:?}"));
    ctx.log_line(&format!("O3 time: {o3_time:?}"));
    info!("best time: {best_time:?}, O3 time: {o3_time:?}");
    if !o3_time.is_zero() {
        let ratio = best_time.as_secs_f64() / o3_time.as_secs_f64();
        ctx.log_line(&format!("ratio (best/O3): {ratio:.3}"));
    }
}
