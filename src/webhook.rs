//! Webhook trigger dispatch
//!
//! Decides which deliveries start a reconciliation pass. Only the event
//! name, the action, the repository and the installation are read; the
//! pass itself re-reads everything it needs from GitHub.

use crate::error::{Error, Result};
use crate::types::RepoRef;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

/// Header carrying the HMAC-SHA256 signature of the raw body
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Header carrying the event name
pub const EVENT_HEADER: &str = "x-github-event";

/// Repository a delivery asks to reconcile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileTarget {
    /// App installation that sent the delivery
    pub installation_id: u64,
    /// Repository to reconcile
    pub repo: RepoRef,
}

#[derive(Deserialize)]
struct EventPayload {
    action: Option<String>,
    repository: Option<RepositoryPayload>,
    installation: Option<InstallationPayload>,
}

#[derive(Deserialize)]
struct RepositoryPayload {
    name: String,
    owner: OwnerPayload,
}

#[derive(Deserialize)]
struct OwnerPayload {
    login: String,
}

#[derive(Deserialize)]
struct InstallationPayload {
    id: u64,
}

/// Whether an event/action pair advances the queue
///
/// - `pull_request.labeled`: the trigger label may have been added
/// - `pull_request.synchronize`: a branch update landed
/// - `pull_request.review_request_removed`: a review finished
/// - `check_run.completed`: CI may have turned green or red
pub fn is_trigger(event_name: &str, action: &str) -> bool {
    matches!(
        (event_name, action),
        (
            "pull_request",
            "labeled" | "synchronize" | "review_request_removed"
        ) | ("check_run", "completed")
    )
}

/// Map a delivery to the repository it should reconcile.
///
/// Returns `Ok(None)` for deliveries the queue ignores. A triggering
/// delivery without repository or installation data is an error.
pub fn dispatch_target(event_name: &str, body: &[u8]) -> Result<Option<ReconcileTarget>> {
    let payload: EventPayload = serde_json::from_slice(body)
        .map_err(|e| Error::Webhook(format!("invalid {event_name} payload: {e}")))?;

    let Some(action) = payload.action.as_deref() else {
        return Ok(None);
    };
    if !is_trigger(event_name, action) {
        return Ok(None);
    }

    let repository = payload.repository.ok_or_else(|| {
        Error::Webhook(format!("{event_name}.{action} delivery has no repository"))
    })?;
    let installation = payload.installation.ok_or_else(|| {
        Error::Webhook(format!("{event_name}.{action} delivery has no installation"))
    })?;

    Ok(Some(ReconcileTarget {
        installation_id: installation.id,
        repo: RepoRef::new(repository.owner.login, repository.name),
    }))
}

/// Verify `X-Hub-Signature-256` (`sha256=<hex>`) against the raw body
pub fn verify_signature(body: &[u8], signature: &str, secret: &str) -> Result<()> {
    let Some(digest_hex) = signature.strip_prefix("sha256=") else {
        return Err(Error::Webhook(
            "signature must use sha256=<hex> format".to_string(),
        ));
    };
    let digest_hex = digest_hex.trim();
    if digest_hex.is_empty() {
        return Err(Error::Webhook("signature digest is empty".to_string()));
    }
    let expected = hex::decode(digest_hex)
        .map_err(|e| Error::Webhook(format!("signature digest is not valid hex: {e}")))?;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Webhook(format!("failed to initialize HMAC: {e}")))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| Error::Webhook("signature verification failed".to_string()))
}
