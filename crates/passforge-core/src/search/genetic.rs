//! Generational genetic algorithm over pass pipelines.

use super::run_timeout;
use crate::cache::SeenCache;
use crate::candidate::{mutation_strength, Candidate, Pipeline};
use crate::config::GaParams;
use crate::eval::Evaluator;
use crate::pool::{EvalPool, EvalResult};
use fastrand::Rng;
use std::time::Duration;
use tracing::info;

/// Fitness-proportional selection over results sorted by elapsed time:
/// the score of a result is the reciprocal of its elapsed microseconds,
/// so faster configurations are proportionally more likely. The roulette
/// scan clamps its landing index so float accumulation error near the
/// top of the wheel cannot run off the end.
pub fn pick_one<'r>(results: &'r [EvalResult], rng: &mut Rng) -> &'r Pipeline {
    let scores: Vec<f64> = results
        .iter()
        .map(|r| 1.0 / (r.elapsed.as_micros().max(1) as f64))
        .collect();
    let total: f64 = scores.iter().sum();

    let r = rng.f64() * total;
    let mut floor = 0.0;
    let mut idx = 0;
    while idx < scores.len() && r >= floor {
        floor += scores[idx];
        idx += 1;
    }
    let idx = idx.saturating_sub(1).min(results.len() - 1);

    results[idx]
        .candidate
        .as_tuned()
        .expect("selection pool contains only tuned candidates")
}

pub struct Genetic<'a> {
    evaluator: &'a Evaluator,
    params: GaParams,
    rng: Rng,
}

impl<'a> Genetic<'a> {
    pub fn new(evaluator: &'a Evaluator, params: GaParams, rng: Rng) -> Self {
        Self {
            evaluator,
            params,
            rng,
        }
    }

    pub fn run(&mut self) -> Pipeline {
        let ctx = self.evaluator.context();
        let catalog = &ctx.catalog;
        let pool = EvalPool::new(self.evaluator, ctx.workers);
        let mut cache = SeenCache::new();
        let size = self.params.population.max(1);

        let mut population: Vec<Pipeline> = (0..size)
            .map(|_| Pipeline::random(self.params.max_opts, catalog, &mut self.rng))
            .collect();

        let mut best: Option<(Pipeline, Duration)> = None;

        for generation in 0..self.params.max_generations {
            // Unbounded until something has actually finished.
            let timeout = best.as_ref().and_then(|(_, d)| run_timeout(*d));

            let candidates = population.iter().cloned().map(Candidate::Tuned).collect();
            let mut results = pool.run_all(candidates, timeout);
            results.sort_by_key(|r| r.elapsed);
            cache.insert_all(catalog, &results);

            let winner = &results[0];
            info!(
                "generation {generation}: best {:?}, {} configurations seen",
                winner.elapsed,
                cache.len()
            );
            ctx.log_line(&format!("{:?}", winner.elapsed));

            if best.as_ref().map_or(true, |(_, d)| winner.elapsed < *d) {
                if let Some(p) = winner.candidate.as_tuned() {
                    best = Some((p.clone(), winner.elapsed));
                }
            }

            // The elites survive without change; the rest of the next
            // generation is bred from fitness-weighted parents, re-mutated
            // until the child is one the cache has not seen.
            let elite = (size as f64 * self.params.elitism) as usize;
            let mut next: Vec<Pipeline> = results
                .iter()
                .take(elite)
                .filter_map(|r| r.candidate.as_tuned().cloned())
                .collect();

            let strength = mutation_strength(self.params.mutation_t, self.params.replace_rate);
            while next.len() < size {
                let a = pick_one(&results, &mut self.rng);
                let b = pick_one(&results, &mut self.rng);
                let mut child = a
                    .cross(b, &mut self.rng)
                    .mutate(strength, catalog, &mut self.rng);
                while cache.contains(catalog, &child) {
                    child = child.mutate(strength, catalog, &mut self.rng);
                }
                next.push(child);
            }
            population = next;
        }

        match best {
            Some((pipeline, _)) => pipeline,
            None => population
                .into_iter()
                .next()
                .expect("population cannot be empty"),
        }
    }
}
