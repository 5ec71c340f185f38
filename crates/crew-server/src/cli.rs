//! Command-line interface definition using clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crew_api::ApiConfig;
use crew_runtime::{ProviderEnv, WorkerConfig};

/// Crew server - runs crew workers behind an HTTP API
#[derive(Parser, Debug)]
#[command(name = "crew-server")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Host to bind to
    #[arg(long, env = "CREW_HOST", default_value = crew_api::config::DEFAULT_HOST)]
    pub host: String,

    /// Port to bind to
    #[arg(short, long, env = "CREW_PORT", default_value_t = crew_api::config::DEFAULT_PORT)]
    pub port: u16,

    /// Python interpreter used to run workers
    #[arg(long, env = "CREW_PYTHON", default_value = crew_runtime::config::DEFAULT_INTERPRETER)]
    pub python: String,

    /// Directory the worker runs in (contains the crew package)
    #[arg(long, env = "CREW_PROJECT_ROOT", default_value = ".")]
    pub project_root: String,

    /// Worker timeout in seconds
    #[arg(long, env = "CREW_TIMEOUT_SECS", default_value_t = 300)]
    pub timeout_secs: u64,

    /// Kill buffered runs when the client disconnects
    #[arg(long, env = "CREW_KILL_ON_DISCONNECT")]
    pub kill_on_disconnect: bool,

    /// Allowed CORS origins (comma-separated, `*` for any)
    #[arg(long, env = "CREW_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub cors_origins: Vec<String>,

    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Returns the log filter for the verbosity level.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "crew_server=info,crew_api=info,crew_runtime=info",
            1 => "crew_server=debug,crew_api=debug,crew_runtime=debug",
            2 => "crew_server=trace,crew_api=trace,crew_runtime=trace,tower_http=debug",
            _ => "trace",
        }
    }

    /// Project root with `~` expanded.
    pub fn project_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.project_root).to_string())
    }

    /// Builds the HTTP server configuration.
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig::new(&self.host, self.port).with_cors_origins(self.cors_origins.clone())
    }

    /// Builds the worker configuration from the flags and provider variables.
    pub fn worker_config<I, K, V>(&self, vars: I) -> WorkerConfig
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let provider = ProviderEnv::from_vars(vars);
        WorkerConfig::new()
            .with_interpreter(&self.python)
            .with_working_dir(self.project_root())
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_kill_on_disconnect(self.kill_on_disconnect)
            .with_provider(&provider)
    }
}
