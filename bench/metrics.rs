use std::time::Duration;

/// Simple timing histogram for computing percentiles
#[derive(Debug, Clone, Default)]
pub struct TimingHistogram {
    samples: Vec<f64>, // milliseconds
}

impl TimingHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a measurement in milliseconds
    pub fn record(&mut self, ms: f64) {
        self.samples.push(ms);
    }

    pub fn record_duration(&mut self, duration: Duration) {
        self.record(duration.as_secs_f64() * 1000.0);
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// Nearest-rank percentile, `p` in `[0, 1]`
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted = self.samples.clone();
        sorted.sort_by(f64::total_cmp);

        let rank = (sorted.len() as f64 * p.clamp(0.0, 1.0)).ceil() as usize;
        Some(sorted[rank.saturating_sub(1).min(sorted.len() - 1)])
    }

    pub fn p50(&self) -> Option<f64> {
        self.percentile(0.5)
    }

    pub fn p95(&self) -> Option<f64> {
        self.percentile(0.95)
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }
}

/// Measure RSS (Resident Set Size) memory usage in bytes
pub fn measure_rss() -> Result<u64, Box<dyn std::error::Error>> {
    let status = std::fs::read_to_string("/proc/self/status")?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            if let Some(kb) = rest.split_whitespace().next() {
                let kb: u64 = kb.parse()?;
                return Ok(kb * 1024);
            }
        }
    }
    Err("VmRSS not found in /proc/self/status".into())
}

/// Returns (mean, std_dev, range)
pub fn compute_stats(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64;

    let min = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

    (mean, variance.sqrt(), max - min)
}
