use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::Result,
    runtime::Dispatcher,
    store::Store,
    types::{FileStatus, MediaFile},
};

/// What to do with a file found stuck in `processing` at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    #[default]
    Retry,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverySettings {
    /// Zero treats every `processing` file as stale.
    pub stale_after: Duration,
    pub action: RecoveryAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub resubmitted: Vec<Uuid>,
    pub failed: Vec<Uuid>,
}

fn is_stale(file: &MediaFile, stale_after: Duration) -> bool {
    let age = Utc::now().signed_duration_since(file.status_updated_at);
    // A clock that went backwards yields a negative age; not stale.
    age.to_std().is_ok_and(|age| age >= stale_after)
}

/// Reconcile files left behind by a previous process.
///
/// Runs once before the service starts taking requests. `uploaded` files are
/// resubmitted as-is. Stale `processing` files are either reset and
/// resubmitted, with any partial transcription and questions removed, or
/// marked `failed`.
pub async fn recover_stale_files(
    store: &dyn Store,
    dispatcher: &Dispatcher,
    settings: RecoverySettings,
) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();

    for file in store.list_files().await? {
        match file.status {
            FileStatus::Uploaded => {
                tracing::info!(file_id = %file.id, "resubmitting queued file");
                dispatcher.submit(file.id);
                report.resubmitted.push(file.id);
            }
            FileStatus::Processing if is_stale(&file, settings.stale_after) => {
                match settings.action {
                    RecoveryAction::Retry => {
                        discard_partial_results(store, file.id).await?;
                        store.set_file_status(file.id, FileStatus::Uploaded).await?;
                        tracing::warn!(file_id = %file.id, "retrying file stuck in processing");
                        dispatcher.submit(file.id);
                        report.resubmitted.push(file.id);
                    }
                    RecoveryAction::Fail => {
                        store.set_file_status(file.id, FileStatus::Failed).await?;
                        tracing::warn!(file_id = %file.id, "marked file stuck in processing as failed");
                        report.failed.push(file.id);
                    }
                }
            }
            _ => {}
        }
    }

    if !report.resubmitted.is_empty() || !report.failed.is_empty() {
        tracing::info!(
            resubmitted = report.resubmitted.len(),
            failed = report.failed.len(),
            "recovery finished"
        );
    }

    Ok(report)
}

async fn discard_partial_results(store: &dyn Store, file_id: Uuid) -> Result<()> {
    if let Some(orphan) = store.find_transcription_by_file(file_id).await? {
        let removed = store.delete_questions_for_transcription(orphan.id).await?;
        store.delete_transcription(orphan.id).await?;
        tracing::debug!(
            file_id = %file_id,
            transcription_id = %orphan.id,
            questions = removed,
            "removed orphaned transcription"
        );
    }
    Ok(())
}
