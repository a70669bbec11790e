use crate::config::BenchmarkRun;
use crate::workloads::{CancelResult, ClusterResult};
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Complete benchmark result for a single run
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResult {
    pub point_count: usize,
    pub dimension: usize,
    pub k: usize,
    pub threads: usize,
    pub repeats: usize,
    pub seed: u64,
    pub kernel: String,
    pub update_strategy: String,
    pub dataset_bytes: u64,
    // Clustering metrics
    pub mean_ms: f64,
    pub std_dev_ms: f64,
    pub range_ms: f64,
    pub iterations: usize,
    pub stop_reason: String,
    pub seeding_ms: f64,
    pub assign_p50_ms: f64,
    pub assign_p95_ms: f64,
    pub update_p50_ms: f64,
    pub update_p95_ms: f64,
    pub inertia: f64,
    pub memory_bytes: u64,
    // Cancellation metrics
    pub cancel_latency_ms: Option<f64>,
    pub cancel_stage: Option<String>,
}

impl BenchmarkResult {
    pub fn from_run_and_results(
        run: &BenchmarkRun,
        dataset_bytes: u64,
        cluster: &ClusterResult,
        cancel: Option<&CancelResult>,
    ) -> Self {
        BenchmarkResult {
            point_count: run.point_count,
            dimension: run.dimension,
            k: run.k,
            threads: run.threads,
            repeats: run.repeats,
            seed: run.seed,
            kernel: cluster.kernel.to_string(),
            update_strategy: format!("{:?}", run.engine.update_strategy),
            dataset_bytes,
            mean_ms: cluster.mean_ms,
            std_dev_ms: cluster.std_dev_ms,
            range_ms: cluster.range_ms,
            iterations: cluster.iterations,
            stop_reason: cluster.stop_reason.clone(),
            seeding_ms: cluster.seeding_ms,
            assign_p50_ms: cluster.assign_p50_ms,
            assign_p95_ms: cluster.assign_p95_ms,
            update_p50_ms: cluster.update_p50_ms,
            update_p95_ms: cluster.update_p95_ms,
            inertia: cluster.inertia,
            memory_bytes: cluster.memory_bytes,
            cancel_latency_ms: cancel.map(|c| c.latency_ms),
            cancel_stage: cancel.map(|c| format!("{:?}", c.stage)),
        }
    }
}

fn create(output_path: &Path) -> Result<BufWriter<File>, Box<dyn std::error::Error>> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(output_path)?))
}

/// Write results to JSON file
pub fn write_json(
    results: &[BenchmarkResult],
    output_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = create(output_path)?;
    serde_json::to_writer_pretty(&mut file, results)?;
    file.flush()?;
    info!("wrote {} results to {:?}", results.len(), output_path);
    Ok(())
}

/// Write results to CSV file
pub fn write_csv(
    results: &[BenchmarkResult],
    output_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = create(output_path)?;
    render_csv(results, &mut file)?;
    file.flush()?;
    info!("wrote {} results to {:?}", results.len(), output_path);
    Ok(())
}

pub fn render_csv<W: Write>(results: &[BenchmarkResult], out: &mut W) -> std::io::Result<()> {
    writeln!(
        out,
        "point_count,dimension,k,threads,repeats,seed,kernel,update_strategy,dataset_bytes,mean_ms,std_dev_ms,range_ms,iterations,stop_reason,seeding_ms,assign_p50_ms,assign_p95_ms,update_p50_ms,update_p95_ms,inertia,memory_bytes,cancel_latency_ms,cancel_stage"
    )?;

    for r in results {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            r.point_count,
            r.dimension,
            r.k,
            r.threads,
            r.repeats,
            r.seed,
            r.kernel,
            r.update_strategy,
            r.dataset_bytes,
            r.mean_ms,
            r.std_dev_ms,
            r.range_ms,
            r.iterations,
            r.stop_reason,
            r.seeding_ms,
            r.assign_p50_ms,
            r.assign_p95_ms,
            r.update_p50_ms,
            r.update_p95_ms,
            r.inertia,
            r.memory_bytes,
            r.cancel_latency_ms.map(|v| v.to_string()).unwrap_or_default(),
            r.cancel_stage.clone().unwrap_or_default(),
        )?;
    }
    Ok(())
}

/// Write results to Markdown file
pub fn write_markdown(
    results: &[BenchmarkResult],
    output_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = create(output_path)?;
    render_markdown(results, &mut file)?;
    file.flush()?;
    info!("wrote {} results to {:?}", results.len(), output_path);
    Ok(())
}

/// One section per dataset shape, one table row per (k, threads).
pub fn render_markdown<W: Write>(results: &[BenchmarkResult], out: &mut W) -> std::io::Result<()> {
    writeln!(out, "# Benchmark Results\n")?;

    let mut grouped: BTreeMap<(usize, usize), Vec<&BenchmarkResult>> = BTreeMap::new();
    for result in results {
        grouped
            .entry((result.point_count, result.dimension))
            .or_default()
            .push(result);
    }

    for ((point_count, dimension), mut group) in grouped {
        group.sort_by_key(|r| (r.k, r.threads));
        writeln!(out, "## Dataset: {} points, dim={}\n", point_count, dimension)?;
        writeln!(
            out,
            "| k | threads | mean (ms) | std (ms) | iterations | stop | seeding (ms) | assign p95 (ms) | update p95 (ms) | inertia | cancel (ms) |"
        )?;
        writeln!(
            out,
            "|---|---------|-----------|----------|------------|------|--------------|-----------------|-----------------|---------|-------------|"
        )?;
        for r in group {
            writeln!(
                out,
                "| {} | {} | {:.2} | {:.2} | {} | {} | {:.2} | {:.2} | {:.2} | {:.4} | {} |",
                r.k,
                if r.threads == 0 {
                    "global".to_string()
                } else {
                    r.threads.to_string()
                },
                r.mean_ms,
                r.std_dev_ms,
                r.iterations,
                r.stop_reason,
                r.seeding_ms,
                r.assign_p95_ms,
                r.update_p95_ms,
                r.inertia,
                r.cancel_latency_ms
                    .map(|v| format!("{:.3}", v))
                    .unwrap_or_else(|| "-".to_string()),
            )?;
        }
        writeln!(out)?;
    }

    Ok(())
}
