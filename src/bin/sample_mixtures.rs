//! Batch mixture sampler.
//!
//! Draws many mixtures for one parent distribution and writes them either as
//! a JSON batch or as simulator-style rows:
//!
//! ```text
//! mean, sd, k, varphi2, (mu_1,sigma_1), (mu_2,sigma_2), ...
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use finite_mixture_sampler::mixture::{
    recover_varphi2, ChildWeights, Mixture, MixtureSampler, MixtureSpec, SamplerConfig,
    SamplerStats,
};

#[derive(Parser, Debug)]
#[command(name = "sample_mixtures", version, about = "Draw moment-preserving finite mixtures")]
struct Args {
    /// Parent mean.
    #[arg(long, default_value_t = 400.0, allow_negative_numbers = true)]
    mean: f64,

    /// Parent standard deviation.
    #[arg(long, default_value_t = 50.0)]
    sd: f64,

    /// Number of equally weighted children.
    #[arg(long, default_value_t = 5)]
    k: usize,

    /// Explicit child weights (comma separated, summing to 1); overrides --k.
    #[arg(long, value_delimiter = ',')]
    weights: Option<Vec<f64>>,

    /// Number of mixtures to draw.
    #[arg(long, default_value_t = 1000)]
    draws: usize,

    /// Random seed; overrides the config file.
    #[arg(long)]
    seed: Option<u64>,

    /// JSON sampler configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads; 1 draws sequentially from a single generator.
    #[arg(long)]
    threads: Option<usize>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Output file (stdout if omitted).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Rows,
}

#[derive(Debug, Serialize)]
struct MixtureBatch<'a> {
    spec: &'a MixtureSpec,
    config: &'a SamplerConfig,
    stats: &'a SamplerStats,
    draws: &'a [Mixture],
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Command-line `--seed` and `--threads` take precedence over the config file.
fn apply_overrides(args: &Args, mut config: SamplerConfig) -> SamplerConfig {
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(threads) = args.threads {
        config = config.with_threads(threads);
    }
    config
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let base = match &args.config {
        Some(path) => {
            let config = SamplerConfig::from_json_file(path)?;
            info!(path = %path.display(), "loaded sampler config");
            config
        }
        None => SamplerConfig::default(),
    };
    let config = apply_overrides(&args, base);

    let weights = match args.weights.clone() {
        Some(w) => ChildWeights::new(w)?,
        None => ChildWeights::uniform(args.k)?,
    };
    let spec = MixtureSpec::weighted(args.mean, args.sd, weights)?;

    info!(
        mean = spec.parent_mean,
        sd = spec.parent_sd,
        k = spec.k(),
        draws = args.draws,
        "sampling mixtures"
    );

    let start = Instant::now();
    let mut sampler = MixtureSampler::new(config)?;

    let pb = ProgressBar::new(args.draws as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} ({eta})")?
            .progress_chars("#>-"),
    );

    let draws = if args.threads == Some(1) {
        let mut draws = Vec::with_capacity(args.draws);
        for _ in 0..args.draws {
            draws.push(sampler.sample(&spec)?);
            pb.inc(1);
        }
        draws
    } else {
        sampler.sample_parallel_with(&spec, args.draws, |_| pb.inc(1))?
    };
    pb.finish_and_clear();

    let stats = sampler.stats().clone();
    info!(
        draws = stats.draws,
        mean_varphi2 = stats.mean_varphi2,
        elapsed_secs = start.elapsed().as_secs_f64(),
        "done"
    );

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(sink);

    match args.format {
        Format::Json => {
            let batch = MixtureBatch {
                spec: &spec,
                config: sampler.config(),
                stats: &stats,
                draws: &draws,
            };
            serde_json::to_writer_pretty(&mut out, &batch)?;
            writeln!(out)?;
        }
        Format::Rows => {
            for mixture in &draws {
                write_row(&mut out, &spec, mixture)?;
            }
        }
    }
    out.flush()?;

    if let Some(path) = &args.output {
        info!(path = %path.display(), "wrote output");
    }
    Ok(())
}

fn write_row<W: Write>(
    out: &mut W,
    spec: &MixtureSpec,
    mixture: &Mixture,
) -> Result<(), Box<dyn std::error::Error>> {
    let varphi2 = match mixture.varphi2 {
        Some(v) => v,
        None => recover_varphi2(spec.parent_sd, &spec.weights, &mixture.child_sds)?,
    };
    let children: Vec<String> = mixture
        .children()
        .map(|(m, s)| format!("({},{})", m, s))
        .collect();

    writeln!(
        out,
        "{}, {}, {}, {}, {}",
        spec.parent_mean,
        spec.parent_sd,
        spec.k(),
        varphi2,
        children.join(", ")
    )?;
    Ok(())
}
