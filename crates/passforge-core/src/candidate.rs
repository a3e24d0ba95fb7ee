use crate::catalog::PassCatalog;
use fastrand::Rng;

pub const INITIAL_INLINE_THRESHOLD: u32 = 325;

const INLINE_STEP: u32 = 50;
const INLINE_FLOOR: u32 = 100;
const MIN_MUTATION_STRENGTH: f64 = 0.05;

/// Per-position replacement probability for a mutation at temperature `t`.
pub fn mutation_strength(t: f64, replace_rate: f64) -> f64 {
    (t * replace_rate).max(MIN_MUTATION_STRENGTH)
}

/// One point in the search space: an ordered pass sequence plus the
/// inliner threshold fed to the optimizer.
///
/// Pass entries are indices into the catalog; repeats are meaningful
/// (running a pass twice is a valid choice).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub passes: Vec<usize>,
    pub inline_threshold: u32,
}

impl Pipeline {
    pub fn random(len: usize, catalog: &PassCatalog, rng: &mut Rng) -> Self {
        let passes = (0..len).map(|_| rng.usize(0..catalog.len())).collect();
        Self {
            passes,
            inline_threshold: INITIAL_INLINE_THRESHOLD,
        }
    }

    /// Replace each pass independently with probability `strength`; fresh
    /// draws range over the catalog plus the `-verify` sentinel. The inliner
    /// threshold moves by ±50 on most draws; a step below the floor is
    /// dropped rather than clamped.
    pub fn mutate(&self, strength: f64, catalog: &PassCatalog, rng: &mut Rng) -> Self {
        let mut next = self.clone();
        for slot in next.passes.iter_mut() {
            if rng.f64() < strength {
                *slot = rng.usize(0..=catalog.sentinel());
            }
        }
        let r = rng.f64();
        if r > 1.0 / 3.0 {
            next.inline_threshold += INLINE_STEP;
        } else if r > 1.0 / 6.0 && next.inline_threshold >= INLINE_FLOOR + INLINE_STEP {
            next.inline_threshold -= INLINE_STEP;
        }
        next
    }

    /// Single-point crossover: the child takes `self`'s prefix and `other`'s
    /// suffix at a uniformly random split, and inherits `self`'s threshold.
    pub fn cross(&self, other: &Pipeline, rng: &mut Rng) -> Self {
        if self.passes.is_empty() {
            return self.clone();
        }
        let k = rng.usize(0..self.passes.len());
        let mut passes = Vec::with_capacity(self.passes.len());
        passes.extend_from_slice(&self.passes[..k]);
        passes.extend_from_slice(&other.passes[k..]);
        Self {
            passes,
            inline_threshold: self.inline_threshold,
        }
    }

    /// Argv handed to the optimizer: memory promotion and the inliner
    /// threshold first, then one flag per pass.
    pub fn as_args(&self, catalog: &PassCatalog) -> Vec<String> {
        let mut args = Vec::with_capacity(self.passes.len() + 2);
        args.push("-mem2reg".to_string());
        args.push(format!("-inline-threshold={}", self.inline_threshold));
        args.extend(self.passes.iter().map(|&i| catalog.flag(i)));
        args
    }

    /// Canonical cache key: the rendered argv, concatenated.
    pub fn key(&self, catalog: &PassCatalog) -> String {
        self.as_args(catalog).concat()
    }

    pub fn render_line(&self, catalog: &PassCatalog) -> String {
        self.as_args(catalog).join(" ")
    }
}

/// Anything the evaluation pipeline can build and time: the vendor's
/// aggressive default, or a tuned pipeline under search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Baseline,
    Tuned(Pipeline),
}

impl Candidate {
    pub fn as_args(&self, catalog: &PassCatalog) -> Vec<String> {
        match self {
            Candidate::Baseline => vec!["-O3".to_string()],
            Candidate::Tuned(p) => p.as_args(catalog),
        }
    }

    pub fn key(&self, catalog: &PassCatalog) -> String {
        self.as_args(catalog).concat()
    }

    pub fn render_line(&self, catalog: &PassCatalog) -> String {
        self.as_args(catalog).join(" ")
    }

    pub fn as_tuned(&self) -> Option<&Pipeline> {
        match self {
            Candidate::Tuned(p) => Some(p),
            Candidate::Baseline => None,
        }
    }
}
