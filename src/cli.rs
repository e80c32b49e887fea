//! CLI argument parsing for trial-analyzer

use crate::config::AnalysisConfig;
use crate::interface::InterfaceRule;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "trial-analyzer")]
#[command(version)]
#[command(about = "Summarize CPU, network and end-to-end latency of collaborative-editing benchmark trials", long_about = None)]
pub struct Cli {
    /// File the summary record is appended to (newline-delimited JSON)
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Framework identifier (e.g. yjs, automerge, collabs)
    #[arg(value_name = "FRAMEWORK")]
    pub framework: String,

    /// Number of clients per trial
    #[arg(value_name = "NUM_CLIENTS")]
    pub num_clients: usize,

    /// Number of shared objects
    #[arg(value_name = "NUM_OBJECTS")]
    pub num_objects: usize,

    /// Stop after this many trials have been accepted
    #[arg(value_name = "TRIALS_TO_KEEP")]
    pub trials_to_keep: usize,

    /// Directory containing the <framework>_<clients>_<objects>_<n> trial directories
    #[arg(short = 'd', long = "data-dir", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// TOML configuration file (flags override its values)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Maximum number of trial directories to try (default: 10)
    #[arg(long = "max-trials", value_name = "N")]
    pub max_trials: Option<usize>,

    /// File name prefix of reference client logs (default: client-1-)
    #[arg(long = "client-prefix", value_name = "PREFIX")]
    pub client_prefix: Option<String>,

    /// Measured interval length in seconds (default: 60)
    #[arg(long = "measurement-length", value_name = "SECS")]
    pub measurement_length: Option<u64>,

    /// Seconds all clients must keep running past the measured interval (default: 10)
    #[arg(long = "buffer", value_name = "SECS")]
    pub buffer: Option<u64>,

    /// How late a resource sample may be, in seconds (default: 5)
    #[arg(long = "sample-tolerance", value_name = "SECS")]
    pub sample_tolerance: Option<u64>,

    /// Latency ceiling and imputed value for missing receives (default: 10000)
    #[arg(long = "max-latency-ms", value_name = "MS")]
    pub max_latency_ms: Option<u64>,

    /// Network interface rule: second-of-two:<prefix>, name:<iface> or prefix:<p>
    #[arg(long = "interface", value_name = "RULE")]
    pub interface: Option<InterfaceRule>,

    /// Sample clients sequentially instead of on parallel threads
    #[arg(long = "no-parallel")]
    pub no_parallel: bool,

    /// Enable trace-level logging
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Merge flags over `base` (defaults or a loaded config file)
    pub fn apply_to(&self, base: AnalysisConfig) -> AnalysisConfig {
        let mut config = base;
        config.framework = self.framework.clone();
        config.num_clients = self.num_clients;
        config.num_objects = self.num_objects;
        config.trials_to_keep = self.trials_to_keep;
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(n) = self.max_trials {
            config.max_trial_attempts = n;
        }
        if let Some(prefix) = &self.client_prefix {
            config.client_file_prefix = prefix.clone();
        }
        if let Some(secs) = self.measurement_length {
            config.measurement_length_secs = secs;
        }
        if let Some(secs) = self.buffer {
            config.buffer_secs = secs;
        }
        if let Some(secs) = self.sample_tolerance {
            config.sample_tolerance_secs = secs;
        }
        if let Some(ms) = self.max_latency_ms {
            config.max_latency_ms = ms;
        }
        if let Some(rule) = &self.interface {
            config.interface_rule = rule.clone();
        }
        if self.no_parallel {
            config.parallel_sampling = false;
        }
        config
    }

    /// Build the effective configuration
    pub fn to_config(&self) -> anyhow::Result<AnalysisConfig> {
        let base = match &self.config {
            Some(path) => AnalysisConfig::from_toml_file(path)?,
            None => AnalysisConfig::default(),
        };
        Ok(self.apply_to(base))
    }
}
