//! Crew server binary.
//!
//! Start the server with:
//! ```bash
//! OPENROUTER_API_KEY=xxx CREW_PROJECT_ROOT=~/crew cargo run -p crew-server
//! ```

mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crew_api::{serve, AppState};
use crew_runtime::CrewRunner;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env.local, falling back to .env
    let _ = dotenvy::from_filename(".env.local").or_else(|_| dotenvy::dotenv());

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(cli.log_filter()))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let worker = cli.worker_config(std::env::vars()).resolve_interpreter();
    if !worker.working_dir.is_dir() {
        eprintln!(
            "Error: project root {} is not a directory",
            worker.working_dir.display()
        );
        std::process::exit(1);
    }
    if !worker.env.contains_key(crew_runtime::config::OPENROUTER_API_KEY) {
        tracing::warn!("no provider API key set; workers will likely fail to authenticate");
    }

    tracing::info!(
        interpreter = %worker.interpreter,
        project_root = %worker.working_dir.display(),
        timeout_secs = worker.timeout.as_secs(),
        kill_on_disconnect = worker.kill_on_disconnect,
        "crew runner configured"
    );

    let config = cli.api_config();
    let state = AppState::new(config.clone(), CrewRunner::new(worker));

    println!("\nCrew server");
    println!("   Listening: http://{}", config.bind_address());
    println!("   Endpoints: POST /api/crew, POST /api/crew/stream, GET /api/health");

    serve(config, state).await?;
    Ok(())
}
