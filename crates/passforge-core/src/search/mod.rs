mod anneal;
mod genetic;

pub use anneal::{acceptance_probability, Annealer};
pub use genetic::{pick_one, Genetic};

use std::time::Duration;

/// Per-run deadline derived from the best measurement so far: four times
/// the best bounds the time wasted on regressions. While the best is
/// still `MAX_ELAPSED` the multiplication overflows and runs stay
/// unbounded.
pub fn run_timeout(best: Duration) -> Option<Duration> {
    best.checked_mul(4)
}
