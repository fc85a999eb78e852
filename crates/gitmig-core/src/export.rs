//! Export orchestrator.
//!
//! Drives the source instance's asynchronous export job through
//! `Resolving -> Triggering -> Polling -> Downloading`. Completion detection
//! differs by resource kind: project exports expose a structured status
//! field, group exports only reveal completion by answering the download
//! request, so the two behaviours live behind a strategy trait.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::client::SourceClient;
use crate::domain::error::{MigrateError, Result};
use crate::domain::target::{MigrationTarget, TargetKind};

/// Fixed interval between poll attempts. No backoff; the job either finishes
/// or the run is terminated externally.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Terminal value of the project export status field.
const EXPORT_READY: &str = "finished";

/// Upper bound on download probes for group exports. The probe strategy has
/// no status signal to distinguish "slow" from "gone", so it refuses to
/// retry forever.
pub const DEFAULT_MAX_PROBES: u32 = 3600;

/// Phases of the export state machine, used to label logs and errors.
/// Any phase can transition to failure; failures are always fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Resolving,
    Triggering,
    Polling,
    Downloading,
    Done,
}

impl std::fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportPhase::Resolving => write!(f, "resolving"),
            ExportPhase::Triggering => write!(f, "triggering"),
            ExportPhase::Polling => write!(f, "polling"),
            ExportPhase::Downloading => write!(f, "downloading"),
            ExportPhase::Done => write!(f, "done"),
        }
    }
}

/// Detects export-job completion and retrieves the payload.
#[async_trait]
pub trait CompletionStrategy: Send + Sync {
    /// Block (sleeping between attempts) until the export job completes,
    /// then return the archive payload.
    async fn wait_for_payload(
        &self,
        client: &SourceClient,
        target: &MigrationTarget,
    ) -> Result<Vec<u8>>;
}

/// Poll the structured status field until it reads `finished`, then issue
/// exactly one download request. Used for project exports. Polls without an
/// overall deadline; only the per-request HTTP timeout bounds each attempt.
pub struct StatusPoll {
    pub interval: Duration,
}

impl Default for StatusPoll {
    fn default() -> Self {
        StatusPoll {
            interval: POLL_INTERVAL,
        }
    }
}

#[async_trait]
impl CompletionStrategy for StatusPoll {
    async fn wait_for_payload(
        &self,
        client: &SourceClient,
        target: &MigrationTarget,
    ) -> Result<Vec<u8>> {
        loop {
            let status = client.export_status(target).await?;
            if status == EXPORT_READY {
                break;
            }
            debug!(target_id = %target.identifier, %status, "export not ready");
            tokio::time::sleep(self.interval).await;
        }
        info!(target_id = %target.identifier, phase = %ExportPhase::Downloading, "export ready");
        client.download_export(target).await
    }
}

/// Repeatedly attempt the download itself; a 404 means the job has not
/// finished yet. Used for group exports, which have no status endpoint.
/// Attempts are bounded so a genuinely missing resource cannot cause
/// infinite silent retry.
pub struct DownloadProbe {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for DownloadProbe {
    fn default() -> Self {
        DownloadProbe {
            interval: POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_PROBES,
        }
    }
}

#[async_trait]
impl CompletionStrategy for DownloadProbe {
    async fn wait_for_payload(
        &self,
        client: &SourceClient,
        target: &MigrationTarget,
    ) -> Result<Vec<u8>> {
        for attempt in 1..=self.max_attempts {
            if let Some(payload) = client.try_download_export(target).await? {
                info!(target_id = %target.identifier, attempt, "export download succeeded");
                return Ok(payload);
            }
            debug!(target_id = %target.identifier, attempt, "export not ready (404)");
            tokio::time::sleep(self.interval).await;
        }
        Err(MigrateError::Download {
            target: target.identifier.clone(),
            reason: format!("export not ready after {} probes", self.max_attempts),
        })
    }
}

/// The strategy matching a target kind.
pub fn strategy_for(kind: TargetKind) -> Box<dyn CompletionStrategy> {
    match kind {
        TargetKind::Project => Box::new(StatusPoll::default()),
        TargetKind::Group => Box::new(DownloadProbe::default()),
    }
}

/// Run the full export flow for one target.
///
/// Resolution happens exactly once and the export is triggered exactly once;
/// the returned target carries the canonical source path for later use as
/// the default import destination. A zero-length payload is fatal here,
/// before the transformation pipeline can run against it.
pub async fn export(
    client: &SourceClient,
    kind: TargetKind,
    identifier: &str,
) -> Result<(MigrationTarget, Vec<u8>)> {
    export_with_strategy(client, kind, identifier, strategy_for(kind).as_ref()).await
}

/// Like [`export`], with an explicit completion strategy.
pub async fn export_with_strategy(
    client: &SourceClient,
    kind: TargetKind,
    identifier: &str,
    strategy: &dyn CompletionStrategy,
) -> Result<(MigrationTarget, Vec<u8>)> {
    info!(%identifier, %kind, phase = %ExportPhase::Resolving, "resolving source target");
    let target = client.resolve(kind, identifier).await?;

    info!(path = %target.resolved_path, phase = %ExportPhase::Triggering, "triggering export");
    client.trigger_export(&target).await?;

    info!(path = %target.resolved_path, phase = %ExportPhase::Polling, "waiting for export");
    let payload = strategy.wait_for_payload(client, &target).await?;

    if payload.is_empty() {
        return Err(MigrateError::Download {
            target: target.identifier.clone(),
            reason: "export payload is empty".to_string(),
        });
    }
    info!(
        path = %target.resolved_path,
        bytes = payload.len(),
        phase = %ExportPhase::Done,
        "export complete"
    );
    Ok((target, payload))
}
