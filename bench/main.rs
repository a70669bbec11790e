extern crate pretty_env_logger;

#[macro_use]
extern crate log;

mod config;
mod dataset;
mod metrics;
mod output;
mod workloads;

use clap::Parser;
use config::BenchmarkConfig;
use indicatif::{ProgressBar, ProgressStyle};
use output::{write_csv, write_json, write_markdown, BenchmarkResult};
use std::path::PathBuf;
use workloads::{cancel_benchmark, cluster_benchmark, PROGRESS_TICKS};

#[derive(Parser, Clone, Debug)]
#[command(version, about = "Benchmark the k-means engine on synthetic datasets")]
struct ArgParser {
    /// YAML benchmark configuration
    config: PathBuf,

    /// Overrides `output_prefix` from the configuration
    #[arg(long)]
    output_prefix: Option<String>,

    /// Verbose logging
    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ArgParser::parse();
    let level = if args.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    pretty_env_logger::formatted_timed_builder()
        .filter_level(level)
        .init();

    info!("loading config from {:?}", args.config);
    let config = BenchmarkConfig::from_file(&args.config)?;
    let runs = config.expand_combinations();
    info!("expanded to {} benchmark runs", runs.len());
    debug!("engine: {:#?}", config.engine);

    let sty = ProgressStyle::with_template(" [{elapsed_precise}] {bar:44.cyan/blue} {msg}")?
        .progress_chars("##-");

    let mut results = Vec::new();
    for (idx, run) in runs.iter().enumerate() {
        info!(
            "run {}/{}: {} points, dim={}, k={}, threads={}",
            idx + 1,
            runs.len(),
            run.point_count,
            run.dimension,
            run.k,
            run.threads
        );

        let points = dataset::generate_blobs(
            run.point_count,
            run.dimension,
            run.blobs,
            run.blob_std,
            run.seed,
        );

        let pbar = ProgressBar::new(PROGRESS_TICKS).with_style(sty.clone());
        let cluster = match cluster_benchmark(run, &points, &pbar) {
            Ok(result) => result,
            Err(e) => {
                pbar.abandon();
                error!("clustering benchmark failed: {}", e);
                continue;
            }
        };
        pbar.finish_and_clear();
        info!(
            "  {:.2}ms mean, {} iterations ({}), inertia {:.4}",
            cluster.mean_ms, cluster.iterations, cluster.stop_reason, cluster.inertia
        );

        let cancel = match cancel_benchmark(run, &points) {
            Ok(Some(result)) => {
                info!(
                    "  cancelled in {:?} stage after {:.3}ms",
                    result.stage, result.latency_ms
                );
                Some(result)
            }
            Ok(None) => {
                info!("  run finished before the cancellation point");
                None
            }
            Err(e) => {
                error!("cancellation benchmark failed: {}", e);
                None
            }
        };

        results.push(BenchmarkResult::from_run_and_results(
            run,
            dataset::dataset_bytes(&points),
            &cluster,
            cancel.as_ref(),
        ));
    }

    let output_prefix = args.output_prefix.unwrap_or(config.output_prefix);
    write_json(&results, &PathBuf::from(format!("{}.json", output_prefix)))?;
    write_csv(&results, &PathBuf::from(format!("{}.csv", output_prefix)))?;
    write_markdown(&results, &PathBuf::from(format!("{}.md", output_prefix)))?;

    info!("finished");
    Ok(())
}
