//! Serialized command dispatch: a keyword registry in front of a strict FIFO
//! queue with a concurrency ceiling of exactly one in-flight job.
//!
//! Serialization exists because jobs share one on-disk workspace root; git
//! working-tree state is not safe for concurrent mutation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Depth of the bounded submission queue between hook sources and the worker.
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

const NOTICE_DRAINING: &str = "Service ending\n";
const NOTICE_NOT_FOUND: &str = "Error: Command not found\n";
const NOTICE_QUEUE_FULL: &str = "Error: Queue full\n";

/// Client-visible write-append-close byte sink bound to one invocation.
///
/// Writes after close are dropped; `close` is idempotent.
pub trait CommandLogger: Send + Sync {
    fn write(&self, text: &str);
    fn close(&self);
    fn is_closed(&self) -> bool;
}

/// Capability contract for a registered command.
#[async_trait]
pub trait Command: Send + Sync {
    fn keyword(&self) -> &str;

    /// Resolves once the command's dependencies are usable.
    async fn ready(&self) -> Result<()> {
        Ok(())
    }

    /// Runs one invocation to completion. Implementations must close the
    /// logger on every path.
    async fn execute(&self, parameters: &BTreeMap<String, String>, logger: Arc<dyn CommandLogger>);

    /// Tears down any resources held by the command.
    async fn shutdown(&self) {}
}

/// One trigger produced by a hook source; consumed exactly once.
pub struct CommandInvocation {
    pub keyword: String,
    pub parameters: BTreeMap<String, String>,
    pub logger: Arc<dyn CommandLogger>,
}

struct QueuedJob {
    command: Arc<dyn Command>,
    parameters: BTreeMap<String, String>,
    logger: Arc<dyn CommandLogger>,
}

/// Keyword registry plus the single-concurrency job queue.
pub struct Commander {
    commands: BTreeMap<String, Arc<dyn Command>>,
    queue_tx: Mutex<Option<mpsc::Sender<QueuedJob>>>,
    pending: Arc<AtomicUsize>,
    draining: AtomicBool,
    worker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Commander {
    /// Awaits every command's readiness, then starts the queue worker.
    pub async fn start(commands: Vec<Arc<dyn Command>>) -> Result<Arc<Self>> {
        let mut registry: BTreeMap<String, Arc<dyn Command>> = BTreeMap::new();
        for command in commands {
            command
                .ready()
                .await
                .with_context(|| format!("command '{}' failed to become ready", command.keyword()))?;
            registry.insert(command.keyword().to_string(), command);
        }

        let (queue_tx, mut queue_rx) = mpsc::channel::<QueuedJob>(COMMAND_QUEUE_CAPACITY);
        let pending = Arc::new(AtomicUsize::new(0));
        let worker_pending = Arc::clone(&pending);
        let worker = tokio::spawn(async move {
            while let Some(job) = queue_rx.recv().await {
                worker_pending.fetch_sub(1, Ordering::SeqCst);
                job.command.execute(&job.parameters, job.logger).await;
            }
        });

        Ok(Arc::new(Self {
            commands: registry,
            queue_tx: Mutex::new(Some(queue_tx)),
            pending,
            draining: AtomicBool::new(false),
            worker: Mutex::new(Some(worker)),
        }))
    }

    /// Routes one invocation: terminal notice for a draining dispatcher or an
    /// unknown keyword, otherwise enqueued in strict submission order.
    pub async fn dispatch(&self, invocation: CommandInvocation) {
        if self.draining.load(Ordering::SeqCst) {
            invocation.logger.write(NOTICE_DRAINING);
            invocation.logger.close();
            return;
        }
        let Some(command) = self.commands.get(&invocation.keyword) else {
            invocation.logger.write(NOTICE_NOT_FOUND);
            invocation.logger.close();
            return;
        };
        let Some(queue_tx) = lock_unpoisoned(&self.queue_tx).clone() else {
            invocation.logger.write(NOTICE_DRAINING);
            invocation.logger.close();
            return;
        };

        // Reserve the slot first so a full queue is rejected immediately
        // instead of blocking the hook request that carried the invocation.
        match queue_tx.try_reserve() {
            Ok(permit) => {
                let position = self.pending.fetch_add(1, Ordering::SeqCst);
                invocation.logger.write(&format!(
                    "Service {} queued (position: {position})\n",
                    invocation.keyword
                ));
                debug!("queued '{}' at position {position}", invocation.keyword);
                permit.send(QueuedJob {
                    command: Arc::clone(command),
                    parameters: invocation.parameters,
                    logger: invocation.logger,
                });
            }
            Err(mpsc::error::TrySendError::Full(())) => {
                warn!("submission rejected: queue full");
                invocation.logger.write(NOTICE_QUEUE_FULL);
                invocation.logger.close();
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                // The queue closed between the drain check and the reserve.
                warn!("submission rejected: queue closed");
                invocation.logger.write(NOTICE_DRAINING);
                invocation.logger.close();
            }
        };
    }

    /// Rejects new submissions, drains the queue, and tears down every
    /// registered command.
    pub async fn shutdown(&self) {
        self.draining.store(true, Ordering::SeqCst);
        lock_unpoisoned(&self.queue_tx).take();
        let worker = lock_unpoisoned(&self.worker).take();
        if let Some(worker) = worker {
            if let Err(error) = worker.await {
                warn!("queue worker ended abnormally: {error}");
            }
        }
        for command in self.commands.values() {
            command.shutdown().await;
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
