//! Launching worker processes.

use std::env;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::SpawnError;

/// A started worker with its frame pipes split off.
pub struct WorkerProcess {
    pub pid: u32,
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
}

pub trait Spawner: Send {
    fn spawn(&self) -> Result<WorkerProcess, SpawnError>;
}

/// Runs a program with frames on stdin/stdout; stderr is inherited so worker
/// logs land next to the supervisor's.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessSpawner {
    pub fn new<I, A>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Re-run this executable in worker mode.
    pub fn current_exe(config_path: &Path) -> io::Result<Self> {
        let program = env::current_exe()?;
        Ok(Self::new(
            program,
            [OsString::from("--worker"), config_path.as_os_str().to_owned()],
        ))
    }
}

impl Spawner for ProcessSpawner {
    fn spawn(&self) -> Result<WorkerProcess, SpawnError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let pid = child.id().ok_or(SpawnError::NoPid)?;
        let stdin = child.stdin.take().ok_or(SpawnError::MissingPipe)?;
        let stdout = child.stdout.take().ok_or(SpawnError::MissingPipe)?;
        Ok(WorkerProcess {
            pid,
            child,
            stdin,
            stdout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_captures_pipes() {
        let spawner = ProcessSpawner::new("cat", Vec::<OsString>::new());
        let mut worker = spawner.spawn().unwrap();
        assert!(worker.pid > 0);
        drop(worker.stdin);
        let status = worker.child.wait().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let spawner = ProcessSpawner::new("/nonexistent/slirc-worker", Vec::<OsString>::new());
        assert!(matches!(spawner.spawn(), Err(SpawnError::Io(_))));
    }

    #[test]
    fn test_current_exe_worker_args() {
        let spawner = ProcessSpawner::current_exe(Path::new("relay.toml")).unwrap();
        assert_eq!(spawner.args, [OsString::from("--worker"), OsString::from("relay.toml")]);
    }
}
