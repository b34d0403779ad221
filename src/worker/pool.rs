//! Round-robin worker selection with failover.

use parking_lot::{Mutex, MutexGuard};
use slirc_wire::frame::encode_event;
use tracing::warn;

use crate::dispatch::EventSink;
use crate::error::{ChannelError, DispatchError};
use crate::network::ConnectionId;

/// Outbound half of a worker's IPC channel.
pub trait WorkerChannel: Send {
    /// Queue one frame without blocking.
    fn send(&self, frame: &str) -> Result<(), ChannelError>;

    /// Stop accepting frames; the worker sees end-of-input once the queue drains.
    fn close(&self);
}

struct Slot<C> {
    pid: u32,
    channel: C,
    alive: bool,
}

/// Fixed-target set of worker slots.
///
/// Dead slots are kept until a replacement takes them, so slot positions,
/// and therefore the rotation order, stay stable across respawns.
pub struct WorkerGroup<C> {
    slots: Vec<Slot<C>>,
    cursor: usize,
    target: usize,
}

impl<C: WorkerChannel> WorkerGroup<C> {
    pub fn new(target: usize) -> Self {
        Self {
            slots: Vec::with_capacity(target),
            cursor: 0,
            target,
        }
    }

    pub fn target(&self) -> usize {
        self.target
    }

    /// Workers still missing to reach the target.
    pub fn deficit(&self) -> usize {
        self.target.saturating_sub(self.live_count())
    }

    /// Add a worker, reusing the first dead slot. Returns the slot index.
    pub fn insert(&mut self, pid: u32, channel: C) -> usize {
        let slot = Slot {
            pid,
            channel,
            alive: true,
        };
        match self.slots.iter().position(|s| !s.alive) {
            Some(index) => {
                self.slots[index] = slot;
                index
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        }
    }

    /// Mark the worker with `pid` dead and close its channel.
    /// Returns false if no live worker had that pid.
    pub fn mark_dead(&mut self, pid: u32) -> bool {
        match self.slots.iter_mut().find(|s| s.alive && s.pid == pid) {
            Some(slot) => {
                slot.alive = false;
                slot.channel.close();
                true
            }
            None => false,
        }
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.alive).count()
    }

    pub fn live_pids(&self) -> Vec<u32> {
        self.slots.iter().filter(|s| s.alive).map(|s| s.pid).collect()
    }

    /// Hand `frame` to the next live worker in rotation.
    ///
    /// Each live worker is tried at most once. On success the rotation moves
    /// past the worker that took the frame and its pid is returned.
    pub fn submit(&mut self, frame: &str) -> Result<u32, DispatchError> {
        let n = self.slots.len();
        let mut attempts = 0;
        for step in 0..n {
            let index = (self.cursor + step) % n;
            let slot = &self.slots[index];
            if !slot.alive {
                continue;
            }
            attempts += 1;
            match slot.channel.send(frame) {
                Ok(()) => {
                    self.cursor = (index + 1) % n;
                    return Ok(slot.pid);
                }
                Err(e) => {
                    warn!(pid = slot.pid, error = %e, "Worker rejected frame");
                }
            }
        }
        if attempts == 0 {
            Err(DispatchError::NoWorkers)
        } else {
            Err(DispatchError::Undeliverable { attempts })
        }
    }

    /// Close every channel and mark all workers dead. Returns the pids that
    /// were live.
    pub fn drain(&mut self) -> Vec<u32> {
        let pids = self.live_pids();
        for slot in &mut self.slots {
            if slot.alive {
                slot.alive = false;
                slot.channel.close();
            }
        }
        pids
    }
}

/// Shared handle over a [`WorkerGroup`], used as the dispatcher's sink.
pub struct WorkerPool<C> {
    group: Mutex<WorkerGroup<C>>,
}

impl<C: WorkerChannel> WorkerPool<C> {
    pub fn new(target: usize) -> Self {
        Self {
            group: Mutex::new(WorkerGroup::new(target)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, WorkerGroup<C>> {
        self.group.lock()
    }

    pub fn live_pids(&self) -> Vec<u32> {
        self.group.lock().live_pids()
    }

    pub fn live_count(&self) -> usize {
        self.group.lock().live_count()
    }
}

impl<C: WorkerChannel> EventSink for WorkerPool<C> {
    fn submit(&self, connection_id: ConnectionId, line: &str) -> Result<(), DispatchError> {
        let frame = encode_event(connection_id, line);
        self.group.lock().submit(&frame).map(|_| ())
    }
}
