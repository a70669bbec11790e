use kmeans_engine::KMeansConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    pub dataset: DatasetConfig,
    /// Cluster counts to request from the engine.
    pub ks: Vec<usize>,
    /// Worker threads per run; 0 uses the global rayon pool.
    pub threads: Vec<usize>,
    /// Timed repetitions per parameter combination.
    pub repeats: usize,
    pub seed: u64,
    pub output_prefix: String,
    /// Engine settings shared by every run. `threads` is overridden per run.
    #[serde(default)]
    pub engine: KMeansConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub dimensions: Vec<usize>,
    pub point_counts: Vec<usize>,
    /// Number of blobs the synthetic points are drawn around.
    pub blobs: usize,
    /// Standard deviation of each blob relative to the spread of blob centers.
    #[serde(default = "default_blob_std")]
    pub blob_std: f32,
}

fn default_blob_std() -> f32 {
    0.1
}

/// A single benchmark run configuration (one parameter combination)
#[derive(Debug, Clone)]
pub struct BenchmarkRun {
    pub dimension: usize,
    pub point_count: usize,
    pub blobs: usize,
    pub blob_std: f32,
    pub k: usize,
    pub threads: usize,
    pub repeats: usize,
    pub seed: u64,
    pub engine: KMeansConfig,
}

impl BenchmarkRun {
    pub fn engine_config(&self) -> KMeansConfig {
        let threads = (self.threads > 0).then_some(self.threads);
        self.engine.clone().with_threads(threads)
    }
}

impl BenchmarkConfig {
    /// Load config from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config: BenchmarkConfig = serde_yaml::from_str(&content)?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Expand all parameter combinations into individual BenchmarkRun structs.
    /// Combinations asking for more clusters than points are skipped.
    pub fn expand_combinations(&self) -> Vec<BenchmarkRun> {
        let mut runs = Vec::new();

        for &dimension in &self.dataset.dimensions {
            for &point_count in &self.dataset.point_counts {
                for &k in self.ks.iter().filter(|&&k| k >= 1 && k <= point_count) {
                    for &threads in &self.threads {
                        runs.push(BenchmarkRun {
                            dimension,
                            point_count,
                            blobs: self.dataset.blobs,
                            blob_std: self.dataset.blob_std,
                            k,
                            threads,
                            repeats: self.repeats.max(1),
                            seed: self.seed,
                            engine: self.engine.clone(),
                        });
                    }
                }
            }
        }

        runs
    }
}
