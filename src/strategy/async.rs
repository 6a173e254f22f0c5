//! Asynchronous batch replay strategy
//!
//! Reading and execution run as separate tasks on a tokio multi-threaded
//! runtime. The reader task parses batches with `AsyncReader` and forwards
//! them over a bounded channel to a single actor task that owns the
//! [`Deployment`](crate::core::Deployment). The actor applies commands in
//! file order, so the result is identical to the synchronous pipeline.
//!
//! ```text
//! AsyncReader ──Vec<Command>──> mpsc (bounded) ──> ReplayActor ──> Deployment
//!                                                      │
//!                          Finish ──oneshot<Vec<Account>>
//! ```

use crate::config::CashierConfig;
use crate::core::Deployment;
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_accounts_csv;
use crate::strategy::{bootstrap, execute_logged, ProcessingStrategy};
use crate::types::{Account, Command};
use std::io::Write;
use std::path::Path;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Configuration for batch processing
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Number of commands per batch
    pub batch_size: usize,
    /// Batches the reader may run ahead of the actor (also the worker thread count)
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig; zero values fall back to the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                requested = batch_size,
                fallback = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                requested = max_concurrent_batches,
                fallback = default.max_concurrent_batches,
                "invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Messages understood by the replay actor
enum ActorMessage {
    Batch(Vec<Command>),
    /// End of input; reply with the final account snapshot
    Finish(oneshot::Sender<Vec<Account>>),
}

/// Sole owner of the deployment while a replay runs
struct ReplayActor {
    deployment: Deployment,
    inbox: mpsc::Receiver<ActorMessage>,
    applied: usize,
    rejected: usize,
}

impl ReplayActor {
    async fn run(mut self) {
        while let Some(message) = self.inbox.recv().await {
            match message {
                ActorMessage::Batch(commands) => {
                    debug!(size = commands.len(), "applying batch");
                    for command in commands {
                        if execute_logged(&mut self.deployment, command) {
                            self.applied += 1;
                        } else {
                            self.rejected += 1;
                        }
                    }
                }
                ActorMessage::Finish(reply) => {
                    info!(applied = self.applied, rejected = self.rejected, "replay finished");
                    let _ = reply.send(self.deployment.accounts());
                    return;
                }
            }
        }
    }
}

/// Asynchronous batch replay strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: CashierConfig,
    batch: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(config: CashierConfig, batch: BatchConfig) -> Self {
        Self { config, batch }
    }

    async fn replay(&self, input_path: &Path) -> Result<Vec<Account>, String> {
        let deployment = bootstrap(&self.config)?;

        let file = tokio::fs::File::open(input_path)
            .await
            .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;
        let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
        let mut reader = AsyncReader::new(compat_file, self.config.decimals);

        let (sender, inbox) = mpsc::channel(self.batch.max_concurrent_batches);
        let actor = tokio::spawn(
            ReplayActor {
                deployment,
                inbox,
                applied: 0,
                rejected: 0,
            }
            .run(),
        );

        loop {
            let batch = reader.read_batch(self.batch.batch_size).await;
            if batch.is_empty() {
                break;
            }
            sender
                .send(ActorMessage::Batch(batch))
                .await
                .map_err(|_| "Replay actor stopped unexpectedly".to_string())?;
        }

        let (reply, snapshot) = oneshot::channel();
        sender
            .send(ActorMessage::Finish(reply))
            .await
            .map_err(|_| "Replay actor stopped unexpectedly".to_string())?;
        let accounts = snapshot
            .await
            .map_err(|_| "Replay actor dropped the final snapshot".to_string())?;
        actor
            .await
            .map_err(|e| format!("Replay actor failed: {}", e))?;
        Ok(accounts)
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.batch.max_concurrent_batches)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let accounts = runtime.block_on(self.replay(input_path))?;
        write_accounts_csv(&accounts, self.config.decimals, output)
    }
}
