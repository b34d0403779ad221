//! Test relay management.
//!
//! Spawns the `slirc-relay` binary with a temporary config file.

use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tempfile::TempDir;
use tokio::time::sleep;

/// A running relay supervisor.
pub struct TestRelay {
    child: Child,
    dir: TempDir,
}

impl TestRelay {
    /// Write `config` to a fresh directory and start the relay on it.
    pub fn spawn(config: &str) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let config_path = dir.path().join("relay.toml");
        std::fs::write(&config_path, config)?;

        let child = Command::new(env!("CARGO_BIN_EXE_slirc-relay"))
            .arg(&config_path)
            .env("RUST_LOG", "slirc_relay=debug")
            .spawn()?;
        Ok(Self { child, dir })
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("relay.toml")
    }

    /// Replace the config file on disk (for SIGHUP rehash).
    pub fn rewrite_config(&self, config: &str) -> anyhow::Result<()> {
        std::fs::write(self.config_path(), config)?;
        Ok(())
    }

    pub fn signal(&self, signal: Signal) -> anyhow::Result<()> {
        let pid = Pid::from_raw(i32::try_from(self.child.id())?);
        kill(pid, signal)?;
        Ok(())
    }

    /// Wait for the relay to exit on its own.
    pub async fn wait(&mut self, limit: Duration) -> anyhow::Result<ExitStatus> {
        let step = Duration::from_millis(50);
        let mut waited = Duration::ZERO;
        while waited < limit {
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            sleep(step).await;
            waited += step;
        }
        anyhow::bail!("relay still running after {:?}", limit)
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Config with one server per `(name, port)` pair.
pub fn config(workers: usize, servers: &[(&str, u16)]) -> String {
    let mut out = format!(
        r##"
[workers]
count = {workers}
shutdown_grace_secs = 5

[connection]
reconnect_delay_secs = 1

[identity]
nick = "relaybot"
username = "relay"
realname = "Relay Bot"
"##
    );
    for (name, port) in servers {
        out.push_str(&format!(
            r##"
[[servers]]
name = "{name}"
host = "127.0.0.1"
port = {port}
channels = ["#{name}"]
"##
        ));
    }
    out
}
