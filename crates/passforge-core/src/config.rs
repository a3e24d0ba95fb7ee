use clap::Args;

/// Simulated-annealing schedule.
#[derive(Args, Debug, Clone, Copy)]
pub struct SaParams {
    #[arg(
        id = "sa-passes",
        long = "sa-passes",
        default_value_t = 100,
        help = "Pipeline length explored by the annealer"
    )]
    pub max_opts: usize,

    #[arg(
        id = "sa-t-max",
        long = "sa-t-max",
        default_value_t = 1.5,
        help = "Starting temperature"
    )]
    pub t_max: f64,

    #[arg(
        id = "sa-t-min",
        long = "sa-t-min",
        default_value_t = 0.1,
        help = "Temperature at which the schedule ends"
    )]
    pub t_min: f64,

    #[arg(
        id = "sa-alpha",
        long = "sa-alpha",
        default_value_t = 0.85,
        help = "Cooling factor applied after every interval"
    )]
    pub alpha: f64,

    #[arg(
        id = "sa-interval",
        long = "sa-interval",
        default_value_t = 500,
        help = "Proposals evaluated per temperature step"
    )]
    pub interval: usize,

    #[arg(
        id = "sa-replace-rate",
        long = "sa-replace-rate",
        default_value_t = 0.5,
        help = "Scale applied to the temperature to get the per-position mutation probability"
    )]
    pub replace_rate: f64,

    #[arg(
        id = "sa-max-stale",
        long = "sa-max-stale",
        default_value_t = 500,
        help = "Stop after this many proposals without a new best"
    )]
    pub max_stale: usize,
}

impl Default for SaParams {
    fn default() -> Self {
        Self {
            max_opts: 100,
            t_max: 1.5,
            t_min: 0.1,
            alpha: 0.85,
            interval: 500,
            replace_rate: 0.5,
            max_stale: 500,
        }
    }
}

/// Generational genetic-algorithm parameters.
#[derive(Args, Debug, Clone, Copy)]
pub struct GaParams {
    #[arg(
        id = "ga-passes",
        long = "ga-passes",
        default_value_t = 120,
        help = "Pipeline length carried by every individual"
    )]
    pub max_opts: usize,

    #[arg(id = "ga-population", long = "ga-population", default_value_t = 100)]
    pub population: usize,

    #[arg(
        id = "ga-elitism",
        long = "ga-elitism",
        default_value_t = 0.1,
        help = "Fraction of the population carried over unchanged"
    )]
    pub elitism: f64,

    #[arg(id = "ga-generations", long = "ga-generations", default_value_t = 100)]
    pub max_generations: usize,

    #[arg(
        id = "ga-mutation-temp",
        long = "ga-mutation-temp",
        default_value_t = 0.2,
        help = "Temperature used when mutating offspring"
    )]
    pub mutation_t: f64,

    #[arg(
        id = "ga-replace-rate",
        long = "ga-replace-rate",
        default_value_t = 0.5
    )]
    pub replace_rate: f64,
}

impl Default for GaParams {
    fn default() -> Self {
        Self {
            max_opts: 120,
            population: 100,
            elitism: 0.1,
            max_generations: 100,
            mutation_t: 0.2,
            replace_rate: 0.5,
        }
    }
}
