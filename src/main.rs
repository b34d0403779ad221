//! slirc-relay - Straylight IRC relay
//!
//! Holds connections to any number of IRC servers and fans their traffic
//! out to a pool of worker processes. The same binary runs both roles:
//!
//! ```text
//! slirc-relay [CONFIG]            supervisor (default CONFIG: relay.toml)
//! slirc-relay --worker CONFIG     worker, frames on stdin/stdout
//! ```

use std::path::PathBuf;

use tracing::{Instrument, error, info, info_span};
use tracing_subscriber::EnvFilter;

use slirc_relay::config::{Config, validate};
use slirc_relay::relay::Relay;
use slirc_relay::worker::{self, ProcessSpawner};

const DEFAULT_CONFIG: &str = "relay.toml";

enum Mode {
    Supervisor,
    Worker,
}

fn parse_args() -> (Mode, PathBuf) {
    let mut mode = Mode::Supervisor;
    let mut path = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--worker" => mode = Mode::Worker,
            _ => path = Some(PathBuf::from(arg)),
        }
    }
    (mode, path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG)))
}

/// Logs always go to stderr: a worker's stdout is its frame channel.
/// `SLIRC_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("SLIRC_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let (mode, config_path) = parse_args();

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path.display(), error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path.display());
    }

    match mode {
        Mode::Worker => {
            let span = info_span!("worker", pid = std::process::id());
            worker::serve(&config).instrument(span).await
        }
        Mode::Supervisor => {
            info!(
                config = %config_path.display(),
                workers = config.workers.count,
                servers = config.servers.len(),
                "Starting slirc-relay"
            );
            let spawner = ProcessSpawner::current_exe(&config_path)?;
            let relay = Relay::new(config, config_path, spawner);
            relay.run().await.map_err(|e| {
                error!(error = %e, error_code = e.error_code(), "Relay stopped with an error");
                e
            })?;
            info!("Shutdown complete");
            Ok(())
        }
    }
}
