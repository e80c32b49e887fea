//! Multi-trial aggregation
//!
//! Trials of one benchmark configuration are analyzed one at a time until
//! enough of them have been accepted. Client stats and latencies of the
//! accepted trials are pooled into a single [`SummaryResult`].

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::report::SummaryResult;
use crate::sampler::ClientStats;
use crate::stats::{self, LatencyPercentiles};
use crate::trial::{self, TrialOutcome, TrialResult};
use tracing::{info, warn};

/// Accumulates accepted trials
#[derive(Debug, Default)]
pub struct Aggregator {
    client_stats: Vec<ClientStats>,
    latencies_ms: Vec<u64>,
    unaccounted: usize,
    trials: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: TrialResult) {
        self.client_stats.extend(result.client_stats);
        self.latencies_ms.extend(result.latencies_ms);
        self.unaccounted += result.unaccounted;
        self.trials += 1;
    }

    /// Number of trials added so far
    pub fn accepted_trials(&self) -> usize {
        self.trials
    }

    /// Compute the summary for `config`'s benchmark configuration
    pub fn finish(mut self, config: &AnalysisConfig) -> SummaryResult {
        let cpu_usages: Vec<f64> = self
            .client_stats
            .iter()
            .map(|s| s.cpu_usage_percent)
            .collect();
        let net_usages: Vec<f64> = self
            .client_stats
            .iter()
            .map(ClientStats::net_bytes_per_sec)
            .collect();

        self.latencies_ms.sort_unstable();
        let latency_count = self.latencies_ms.len();
        let lat_unaccounted =
            (latency_count > 0).then(|| 100.0 * self.unaccounted as f64 / latency_count as f64);

        SummaryResult {
            framework: config.framework.clone(),
            num_clients: config.num_clients,
            num_objects: config.num_objects,
            trials: self.trials,
            count: self.client_stats.len(),
            cpu_usage: stats::summarize(&cpu_usages),
            net_usage: stats::summarize(&net_usages),
            latency_count,
            latency: LatencyPercentiles::from_sorted(&self.latencies_ms),
            lat_unaccounted,
        }
    }
}

/// Drive `analyze` over trial numbers `1..=max_trial_attempts`, stopping
/// once `trials_to_keep` trials are accepted.
pub fn run_with<F>(config: &AnalysisConfig, mut analyze: F) -> Result<SummaryResult>
where
    F: FnMut(usize) -> Result<TrialOutcome>,
{
    let mut aggregator = Aggregator::new();

    for trial in 1..=config.max_trial_attempts {
        info!("TRIAL: {}", trial);
        match analyze(trial)? {
            TrialOutcome::Accepted(result) => {
                info!(
                    trial,
                    clients = result.client_stats.len(),
                    latencies = result.latencies_ms.len(),
                    unaccounted = result.unaccounted,
                    "trial accepted"
                );
                aggregator.add(result);
                if aggregator.accepted_trials() == config.trials_to_keep {
                    break;
                }
            }
            TrialOutcome::Skipped(reason) => warn!("Trial {} skipped: {}", trial, reason),
        }
    }

    if aggregator.accepted_trials() < config.trials_to_keep {
        warn!(
            "Only {} of {} trials accepted for {}",
            aggregator.accepted_trials(),
            config.trials_to_keep,
            config.bench_name()
        );
    }

    Ok(aggregator.finish(config))
}

/// Analyze the trial directories of `config` and summarize them
pub fn run(config: &AnalysisConfig) -> Result<SummaryResult> {
    config.validate()?;
    run_with(config, |n| {
        let dir = config.trial_dir(n);
        info!("Trial directory: {}", dir.display());
        trial::analyze_trial(&dir, config)
    })
}
