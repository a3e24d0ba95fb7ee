use crate::candidate::Pipeline;
use crate::catalog::PassCatalog;
use crate::pool::EvalResult;
use std::collections::HashSet;

/// Remembers every configuration already scored, by canonical rendered
/// argv, so the genetic algorithm never re-evaluates a known pipeline.
/// No eviction: generations are bounded and keys are small.
#[derive(Debug, Default)]
pub struct SeenCache {
    keys: HashSet<String>,
}

impl SeenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, catalog: &PassCatalog, pipeline: &Pipeline) -> bool {
        self.keys.contains(&pipeline.key(catalog))
    }

    pub fn insert_all(&mut self, catalog: &PassCatalog, results: &[EvalResult]) {
        for result in results {
            self.keys.insert(result.candidate.key(catalog));
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
