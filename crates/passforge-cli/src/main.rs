use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use passforge_core::candidate::Candidate;
use passforge_core::catalog::{PassCatalog, OPTS_FILENAME};
use passforge_core::config::{GaParams, SaParams};
use passforge_core::context::{sibling_path, EvalMode, LogSinks, TuneContext};
use passforge_core::eval::Evaluator;
use passforge_core::replay::ReplayClient;
use passforge_core::report::report_speedup;
use passforge_core::search::{Annealer, Genetic};
use std::fmt;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Search for a pass pipeline that beats the vendor's -O3 on your program"
)]
struct Cli {
    /// Bitcode file to tune
    bitcode: PathBuf,

    #[arg(long, default_value = "Makefile", help = "Build driver used to lower, run and verify")]
    makefile: String,

    #[arg(
        long = "exe-var",
        default_value = "EXE",
        help = "Variable the driver reads for the executable path"
    )]
    exe_var: String,

    #[arg(
        long = "bc-var",
        default_value = "BC",
        help = "Variable the driver reads for the optimized bitcode path"
    )]
    bc_var: String,

    #[arg(
        long = "obj-var",
        default_value = "OBJ",
        help = "Variable the driver reads for the object path (replay mode)"
    )]
    obj_var: String,

    #[arg(long = "run-rule", default_value = "run", help = "Rule that prints the program's run command")]
    run_rule: String,

    #[arg(long = "verify-rule", default_value = "verify", help = "Rule that checks the program's output")]
    verify_rule: String,

    #[arg(short = 'w', long = "workers", default_value_t = default_workers(), help = "Concurrent evaluations")]
    workers: usize,

    #[arg(long, help = "Measure through long-lived replay workers instead of full runs")]
    server: bool,

    #[arg(long = "worker-data", default_value = "worker-data.txt", help = "File listing one replay socket path per line")]
    worker_data: PathBuf,

    #[arg(long = "worker-weight", default_value = "worker-weight.txt", help = "File listing one weight per replay worker")]
    worker_weight: PathBuf,

    #[arg(long, value_enum, default_value = "sa")]
    strategy: Strategy,

    #[arg(long, help = "Fix the RNG seed for a reproducible search")]
    seed: Option<u64>,

    #[command(flatten)]
    sa: SaParams,

    #[command(flatten)]
    ga: GaParams,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Strategy {
    /// Simulated annealing
    Sa,
    /// Genetic algorithm
    Ga,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Sa => f.write_str("simulated annealing"),
            Strategy::Ga => f.write_str("genetic algorithm"),
        }
    }
}

fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cpus + 1) / 2
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };

    if !cli.bitcode.exists() {
        error!("Bitcode file {} doesn't exist", cli.bitcode.display());
        process::exit(1);
    }

    let catalog = PassCatalog::load(OPTS_FILENAME).unwrap_or_else(|e| {
        error!("Failed to load the pass catalog: {e}");
        process::exit(1);
    });
    info!("📂 Loaded {} passes from {}", catalog.len(), OPTS_FILENAME);

    let logs = LogSinks::create(&cli.bitcode).unwrap_or_else(|e| {
        error!("Failed to create log files: {e}");
        process::exit(1);
    });

    // Replay workers cannot be dialed concurrently, so replay mode is
    // strictly serial regardless of -w.
    let (mode, replay, workers) = if cli.server {
        let client =
            ReplayClient::from_manifests(&cli.worker_data, &cli.worker_weight).unwrap_or_else(
                |e| {
                    error!("Failed to load the replay worker manifests: {e}");
                    process::exit(1);
                },
            );
        info!("🔌 Replay mode with {} workers, serial evaluation", client.worker_count());
        (EvalMode::Replay, Some(client), 1)
    } else {
        (EvalMode::Local, None, cli.workers.max(1))
    };

    let ctx = Arc::new(TuneContext {
        catalog,
        bitcode: cli.bitcode.clone(),
        makefile: cli.makefile,
        exe_var: cli.exe_var,
        bc_var: cli.bc_var,
        obj_var: cli.obj_var,
        run_rule: cli.run_rule,
        verify_rule: cli.verify_rule,
        mode,
        workers,
        compiler_timeout: Duration::from_secs(30),
        opt_cmd: "opt".into(),
        llc_cmd: "llc".into(),
        make_cmd: "make".into(),
        replay,
        logs,
    });
    let evaluator = Evaluator::new(ctx.clone());

    let rng = match cli.seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };

    info!(
        "🚀 Tuning {} with {} ({} workers)",
        ctx.bitcode.display(),
        cli.strategy,
        workers
    );

    let best = match cli.strategy {
        Strategy::Sa => Annealer::new(&evaluator, cli.sa, rng).run(),
        Strategy::Ga => Genetic::new(&evaluator, cli.ga, rng).run(),
    };

    let line = Candidate::Tuned(best.clone()).render_line(&ctx.catalog);
    let passes_path = sibling_path(&ctx.bitcode, ".passes");
    if let Err(e) = std::fs::write(&passes_path, format!("{line}\n")) {
        error!("Failed to write {}: {e}", passes_path.display());
        process::exit(1);
    }

    ctx.log_line(&format!("\nbest:\n\t{line}"));
    report_speedup(&evaluator, &best);

    ctx.shutdown_replay();
    info!("✅ Winning pipeline written to {}", passes_path.display());
}
