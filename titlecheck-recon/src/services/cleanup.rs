//! Transient-state cleanup and message foldering
//!
//! Runs after every reconciliation, success or failure. Blob deletion is
//! idempotent (delete-if-exists everywhere) so re-triggered cleanup is
//! harmless. Foldering is mailbox hygiene only: failures are logged and
//! never escalated, since compliance correctness does not depend on it.

use crate::clients::{delete_prefix, Mailbox, ObjectStore};
use crate::paths;
use titlecheck_common::models::PairDescriptor;
use titlecheck_common::{Result, Settings};

/// Delete all transient blobs for a pair: both pending prefixes and the
/// pair-declaration record
pub async fn delete_transient_state(
    store: &dyn ObjectStore,
    descriptor: &PairDescriptor,
) -> Result<()> {
    delete_prefix(store, &paths::pending_prefix(&descriptor.spreadsheet.message_id)).await?;
    delete_prefix(store, &paths::pending_prefix(&descriptor.archive.message_id)).await?;
    store.delete(&paths::pair_path(&descriptor.pair_id)).await?;
    Ok(())
}

/// Move both source messages into the Processed or Failed folder, creating
/// the folder on first use. All failures are logged, not returned.
pub async fn file_messages(
    mailbox: &dyn Mailbox,
    settings: &Settings,
    descriptor: &PairDescriptor,
    success: bool,
) {
    let folder_name = if success {
        &settings.processed_folder
    } else {
        &settings.failed_folder
    };

    let folder_id = match ensure_folder(mailbox, folder_name).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(folder = %folder_name, "Cannot resolve mail folder: {}", e);
            return;
        }
    };

    for message_id in [
        &descriptor.spreadsheet.message_id,
        &descriptor.archive.message_id,
    ] {
        if let Err(e) = mailbox.move_message(message_id, &folder_id).await {
            tracing::warn!(message_id = %message_id, folder = %folder_name, "Move failed: {}", e);
        }
    }
}

/// Find a folder by display name, creating it if absent. A create that
/// races another instance is tolerated by re-looking-up on failure.
async fn ensure_folder(mailbox: &dyn Mailbox, display_name: &str) -> Result<String> {
    if let Some(id) = mailbox.find_folder(display_name).await? {
        return Ok(id);
    }
    match mailbox.create_folder(display_name).await {
        Ok(id) => Ok(id),
        Err(create_err) => match mailbox.find_folder(display_name).await? {
            Some(id) => Ok(id),
            None => Err(create_err),
        },
    }
}
