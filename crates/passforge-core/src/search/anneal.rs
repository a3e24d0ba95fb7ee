//! Simulated annealing over pass pipelines.
//!
//! One chain of mutations of the current configuration, cooled on a
//! geometric schedule. In local mode the annealer may evaluate several
//! speculative proposals per step; they are always adopted in proposal
//! order, never completion order, so a fixed seed fixes the trajectory.

use super::run_timeout;
use crate::candidate::{mutation_strength, Candidate, Pipeline};
use crate::config::SaParams;
use crate::context::EvalMode;
use crate::eval::{Evaluator, MAX_ELAPSED};
use fastrand::Rng;
use std::thread;
use std::time::Duration;
use tracing::info;

/// Chance of adopting a proposal, given the current and proposed costs.
///
/// An improvement is always adopted; a failed proposal never is. A
/// regression is adopted with probability `exp(diff / t)` where `diff`
/// normalizes the slowdown against the current cost (one unit per 0.5%).
pub fn acceptance_probability(current: Duration, proposed: Duration, t: f64) -> f64 {
    if proposed == MAX_ELAPSED {
        return 0.0;
    }
    if proposed <= current {
        return 1.0;
    }
    let current_s = current.as_secs_f64();
    let diff = (current_s - proposed.as_secs_f64()) / current_s * 200.0;
    (diff / t).exp()
}

struct Proposal {
    pipeline: Pipeline,
    cost: Duration,
    accepted: bool,
}

pub struct Annealer<'a> {
    evaluator: &'a Evaluator,
    params: SaParams,
    rng: Rng,
}

impl<'a> Annealer<'a> {
    pub fn new(evaluator: &'a Evaluator, params: SaParams, rng: Rng) -> Self {
        Self {
            evaluator,
            params,
            rng,
        }
    }

    pub fn run(&mut self) -> Pipeline {
        let ctx = self.evaluator.context();
        let catalog = &ctx.catalog;
        // Replay workers do not tolerate concurrent dials.
        let workers = match ctx.mode {
            EvalMode::Replay => 1,
            EvalMode::Local => ctx.workers.max(1),
        };

        let mut current = Pipeline::random(self.params.max_opts, catalog, &mut self.rng);
        let mut cost = self
            .evaluator
            .measure(&Candidate::Tuned(current.clone()), None);
        let mut best = current.clone();
        let mut best_cost = cost;
        let mut stale = 0usize;

        let mut t = self.params.t_max;
        while t > self.params.t_min {
            info!("annealing at t={t:.3}, best so far {best_cost:?}");
            let mut itr = 0usize;
            while itr < self.params.interval {
                let proposals = self.propose_batch(&current, cost, best_cost, t, workers);

                let mut scanned = 0usize;
                for proposal in proposals {
                    scanned += 1;
                    stale += 1;
                    if !proposal.accepted {
                        continue;
                    }
                    current = proposal.pipeline;
                    cost = proposal.cost;

                    if cost < best_cost {
                        if self.confirm_best(&current) {
                            stale = 0;
                            best_cost = cost;
                            best = current.clone();
                        } else {
                            // The replay measurement lied; fall back to the
                            // last configuration known to build for real.
                            current = best.clone();
                            cost = best_cost;
                        }
                    }
                    break;
                }

                if stale >= self.params.max_stale {
                    return best;
                }

                itr += scanned;
                ctx.log_line(&format!("{itr}: {cost:?} (best = {best_cost:?})"));
            }
            t *= self.params.alpha;
        }
        best
    }

    /// Checkpoint a would-be best through the full local pipeline. The
    /// replay fast path cannot see codegen divergence, so a promotion in
    /// replay mode only stands if a real build and run still succeed.
    fn confirm_best(&self, pipeline: &Pipeline) -> bool {
        let ctx = self.evaluator.context();
        if ctx.mode != EvalMode::Replay {
            return true;
        }
        match self
            .evaluator
            .evaluate_as(&Candidate::Tuned(pipeline.clone()), None, EvalMode::Local)
        {
            Ok(_) => true,
            Err(err) => {
                ctx.log_error(&err);
                false
            }
        }
    }

    /// Evaluate `workers` independent mutations of `current`, each with
    /// its own derived RNG and its own acceptance draw. The returned list
    /// is in proposal order.
    fn propose_batch(
        &mut self,
        current: &Pipeline,
        cost: Duration,
        best_cost: Duration,
        t: f64,
        workers: usize,
    ) -> Vec<Proposal> {
        let evaluator = self.evaluator;
        let catalog = &evaluator.context().catalog;
        let timeout = run_timeout(best_cost);
        let strength = mutation_strength(t, self.params.replace_rate);
        let seeds: Vec<u64> = (0..workers).map(|_| self.rng.u64(..)).collect();

        thread::scope(|s| {
            let handles: Vec<_> = seeds
                .into_iter()
                .map(|seed| {
                    s.spawn(move || {
                        let mut rng = Rng::with_seed(seed);
                        let mutated = current.mutate(strength, catalog, &mut rng);
                        let new_cost =
                            evaluator.measure(&Candidate::Tuned(mutated.clone()), timeout);
                        let ap = acceptance_probability(cost, new_cost, t);
                        Proposal {
                            pipeline: mutated,
                            cost: new_cost,
                            accepted: ap > rng.f64(),
                        }
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("proposal thread panicked"))
                .collect()
        })
    }
}
