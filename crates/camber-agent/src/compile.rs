//! Debounced background compilation of the artifact

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::artifact::ArtifactStore;
use crate::error::Result;
use crate::events::SessionEvent;

/// Quiet period after the last artifact write before a compile starts.
/// Every write restarts the timer, so a burst of writes compiles once.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(800);

/// Compiles OpenSCAD source into a binary STL mesh
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Run one compile. Compiler-reported failures are data
    /// (`CompileResult::Failure`); `Err` is reserved for the adapter
    /// itself breaking, and the driver folds it into a failure.
    async fn compile(&self, source: &str) -> Result<CompileResult>;
}

/// Result of compiling the artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileResult {
    Success { mesh: Vec<u8> },
    Failure { diagnostic: String },
}

impl CompileResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CompileResult::Success { .. })
    }
}

/// Outcome of one compile pass, tagged with the artifact version it read
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub version: u64,
    pub result: CompileResult,
}

/// Wait for a compile outcome covering at least the given artifact
/// version. Returns None when the driver has shut down.
pub async fn await_outcome(
    rx: &mut watch::Receiver<Option<CompileOutcome>>,
    min_version: u64,
) -> Option<CompileOutcome> {
    loop {
        {
            let current = rx.borrow_and_update();
            if let Some(outcome) = current.as_ref() {
                if outcome.version >= min_version {
                    return Some(outcome.clone());
                }
            }
        }
        if rx.changed().await.is_err() {
            return None;
        }
    }
}

/// Background task that watches the artifact store and keeps the compiled
/// mesh current.
///
/// At most one compile runs at a time. Writes that land during a compile
/// are picked up by the next pass; intermediate versions are dropped, not
/// queued, so only the latest source ever compiles.
pub struct CompileDriver {
    store: Arc<ArtifactStore>,
    compiler: Arc<dyn Compiler>,
    events: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
    outcome_tx: watch::Sender<Option<CompileOutcome>>,
}

impl CompileDriver {
    /// Spawn the driver task, returning the outcome channel
    pub fn spawn(
        store: Arc<ArtifactStore>,
        compiler: Arc<dyn Compiler>,
        events: broadcast::Sender<SessionEvent>,
        cancel: CancellationToken,
    ) -> watch::Receiver<Option<CompileOutcome>> {
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let driver = Self {
            store,
            compiler,
            events,
            cancel,
            outcome_tx,
        };
        tokio::spawn(driver.run());
        outcome_rx
    }

    async fn run(self) {
        let mut versions = self.store.subscribe();
        loop {
            // wait for a write
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                changed = versions.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
            // quiet period; further writes restart the timer
            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    _ = tokio::time::sleep(DEBOUNCE_WINDOW) => break,
                    changed = versions.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }
            self.compile_current().await;
        }
    }

    async fn compile_current(&self) {
        let (source, version) = self.store.source();
        let _ = self.events.send(SessionEvent::CompileStarted { version });
        tracing::debug!(version, "compiling artifact");

        let result = match self.compiler.compile(&source).await {
            Ok(result) => result,
            Err(e) => CompileResult::Failure {
                diagnostic: e.to_string(),
            },
        };

        match &result {
            CompileResult::Success { mesh } => {
                self.store.store_mesh(mesh.clone());
                let _ = self.events.send(SessionEvent::CompileSucceeded { version });
            }
            CompileResult::Failure { diagnostic } => {
                tracing::debug!(version, "compile failed: {diagnostic}");
                let _ = self.events.send(SessionEvent::CompileFailed {
                    version,
                    diagnostic: diagnostic.clone(),
                });
            }
        }

        let _ = self.outcome_tx.send(Some(CompileOutcome { version, result }));
    }
}
