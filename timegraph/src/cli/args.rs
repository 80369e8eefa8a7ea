//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::capture::SyntheticConfig;
use crate::config::SessionOptions;

#[derive(Parser, Debug)]
#[command(
    name = "timegraph",
    about = "Run a synthetic capture through the timeline engine and report on it",
    after_help = "\
EXAMPLES:
    timegraph                                     Default capture (4 threads)
    timegraph --threads 8 --timers 2000           Larger capture
    timegraph --instrument Render --instrument Physics
    timegraph --filter worker-1 --export trace.json"
)]
pub struct Args {
    /// Threads of the synthetic target
    #[arg(long, default_value = "4")]
    pub threads: usize,

    /// Instrumented calls per thread
    #[arg(long, default_value = "250")]
    pub timers: usize,

    /// Callstack samples per thread
    #[arg(long, default_value = "200")]
    pub samples: usize,

    /// Functions in the target's main module
    #[arg(long, default_value = "8")]
    pub functions: usize,

    /// CPU cores reported by the scheduler lane
    #[arg(long, default_value = "4")]
    pub cores: usize,

    /// GPU timelines (0 disables GPU jobs)
    #[arg(long, default_value = "1")]
    pub gpu_timelines: usize,

    /// Instrument functions whose name contains PATTERN (repeatable; all if omitted)
    #[arg(long, value_name = "PATTERN")]
    pub instrument: Vec<String>,

    /// Only list threads whose name contains one of these space-separated tokens
    #[arg(long, value_name = "TOKENS")]
    pub filter: Option<String>,

    /// Keep capturing this many milliseconds before stopping
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Worker threads issuing the start request
    #[arg(long, default_value = "1")]
    pub workers: usize,

    /// Export timers as a Chrome trace
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    #[must_use]
    pub fn synthetic_config(&self) -> SyntheticConfig {
        SyntheticConfig {
            threads: self.threads,
            timers_per_thread: self.timers,
            samples_per_thread: self.samples,
            functions: self.functions,
            gpu_timelines: self.gpu_timelines,
            cores: self.cores,
            ..SyntheticConfig::default()
        }
    }

    #[must_use]
    pub fn session_options(&self, pid: i32) -> SessionOptions {
        // An empty pattern matches every function
        let function_patterns =
            if self.instrument.is_empty() { vec![String::new()] } else { self.instrument.clone() };
        SessionOptions { pid, function_patterns, worker_threads: self.workers, ..SessionOptions::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_instrument_everything() {
        let args = Args::parse_from(["timegraph"]);
        let options = args.session_options(7);

        assert_eq!(options.pid, 7);
        assert_eq!(options.function_patterns, vec![String::new()]);
        assert_eq!(args.synthetic_config().threads, 4);
    }

    #[test]
    fn test_repeated_instrument_patterns() {
        let args = Args::parse_from(["timegraph", "--instrument", "Render", "--instrument", "Tick", "--threads", "2"]);

        assert_eq!(args.session_options(1).function_patterns, vec!["Render".to_string(), "Tick".to_string()]);
        assert_eq!(args.synthetic_config().threads, 2);
    }
}
