//! Single-writer mutation queue.
//!
//! The workspace is owned by exactly one thread. Any other thread that needs
//! to read-then-write it submits a closure through a [`MutationHandle`] and
//! blocks until the mutation thread has run it. Tasks run one at a time in
//! submission order.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle, ThreadId};

use skel_core::LogContext;

use crate::error::{io_err, SyncError};
use crate::workspace::Workspace;

type Task = Box<dyn FnOnce(&mut dyn Workspace) + Send>;

/// Owner of the mutation thread.
pub struct MutationQueue<W> {
    sender: Option<Sender<Task>>,
    worker: Option<JoinHandle<W>>,
    worker_id: ThreadId,
    log: LogContext,
}

/// Cloneable submission side of a [`MutationQueue`].
#[derive(Clone)]
pub struct MutationHandle {
    sender: Sender<Task>,
    worker_id: ThreadId,
}

impl<W: Workspace + Send + 'static> MutationQueue<W> {
    /// Move `workspace` onto a new mutation thread.
    pub fn spawn(workspace: W, log: LogContext) -> Result<Self, SyncError> {
        let (sender, receiver) = mpsc::channel::<Task>();
        let span = log.span().clone();
        let worker = thread::Builder::new()
            .name("skel-mutation".to_string())
            .spawn(move || span.in_scope(|| run(workspace, receiver)))
            .map_err(|e| io_err("skel-mutation thread", e))?;
        let worker_id = worker.thread().id();
        log.in_scope(|| tracing::debug!("mutation thread started"));
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            worker_id,
            log,
        })
    }

    pub fn handle(&self) -> Result<MutationHandle, SyncError> {
        let sender = self.sender.clone().ok_or(SyncError::QueueClosed)?;
        Ok(MutationHandle {
            sender,
            worker_id: self.worker_id,
        })
    }

    /// Close the queue, wait for queued tasks to drain and take the
    /// workspace back.
    ///
    /// Outstanding handles keep the thread alive; drop them first.
    pub fn shutdown(mut self) -> Result<W, SyncError> {
        self.sender = None;
        let worker = self.worker.take().ok_or(SyncError::QueueClosed)?;
        let workspace = worker
            .join()
            .map_err(|_| SyncError::WorkerPanicked("skel-mutation"))?;
        self.log.in_scope(|| tracing::debug!("mutation thread stopped"));
        Ok(workspace)
    }
}

fn run<W: Workspace>(mut workspace: W, tasks: Receiver<Task>) -> W {
    for task in tasks {
        task(&mut workspace);
    }
    workspace
}

impl MutationHandle {
    /// Run `f` on the mutation thread and wait for its result.
    pub fn execute_sync<R, F>(&self, f: F) -> Result<R, SyncError>
    where
        R: Send + 'static,
        F: FnOnce(&mut dyn Workspace) -> R + Send + 'static,
    {
        if thread::current().id() == self.worker_id {
            return Err(SyncError::ReentrantMutation);
        }
        let (reply, result) = mpsc::sync_channel(1);
        let task: Task = Box::new(move |ws| {
            let _ = reply.send(f(ws));
        });
        self.sender.send(task).map_err(|_| SyncError::QueueClosed)?;
        result.recv().map_err(|_| SyncError::QueueClosed)
    }
}
