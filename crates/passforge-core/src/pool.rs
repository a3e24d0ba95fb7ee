//! Bounded-parallel evaluation of a batch of candidates.
//!
//! External processes dominate the cost, so a thread per in-flight
//! evaluation with an `mpsc` channel back to the scheduler is plenty.
//! Results come back in completion order, not input order.

use crate::candidate::Candidate;
use crate::eval::Evaluator;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EvalResult {
    pub candidate: Candidate,
    pub elapsed: Duration,
}

pub struct EvalPool<'a> {
    evaluator: &'a Evaluator,
    workers: usize,
}

impl<'a> EvalPool<'a> {
    pub fn new(evaluator: &'a Evaluator, workers: usize) -> Self {
        Self {
            evaluator,
            workers: workers.max(1),
        }
    }

    /// Evaluate every candidate, keeping at most `workers` in flight.
    /// Failures come back as `MAX_ELAPSED`, never as a panic.
    pub fn run_all(&self, candidates: Vec<Candidate>, timeout: Option<Duration>) -> Vec<EvalResult> {
        let total = candidates.len();
        let mut results = Vec::with_capacity(total);
        let (tx, rx) = mpsc::channel();

        thread::scope(|s| {
            let mut in_flight = 0;
            for candidate in candidates {
                if in_flight == self.workers {
                    results.push(rx.recv().expect("evaluation worker disappeared"));
                    in_flight -= 1;
                }
                let tx = tx.clone();
                let evaluator = self.evaluator;
                s.spawn(move || {
                    let elapsed = evaluator.measure(&candidate, timeout);
                    let _ = tx.send(EvalResult { candidate, elapsed });
                });
                in_flight += 1;
            }
            while results.len() < total {
                results.push(rx.recv().expect("evaluation worker disappeared"));
            }
        });

        results
    }
}
