//! Worker processes and the supervisor that keeps them running.

mod channel;
mod child;
mod pool;
mod spawn;
mod supervisor;

pub use self::channel::PipeChannel;
pub use self::child::{Control, forward_signals, run, serve};
pub use self::pool::{WorkerChannel, WorkerGroup, WorkerPool};
pub use self::spawn::{ProcessSpawner, Spawner, WorkerProcess};
pub use self::supervisor::{Supervisor, SupervisorEvent};
