use thiserror::Error;

/// Substring the push pipeline uses to flag an address that can no longer
/// receive notifications.
pub const FAILED_TO_SEND_MARKER: &str = "failed to send notification";

#[derive(Debug, Error)]
pub enum PushError {
    /// The push service refused the address itself (e.g. the app was uninstalled).
    #[error("Failed to send notification: {0}")]
    AddressRejected(String),

    #[error("Push request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Push service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Push service error: {0}")]
    Service(String),
}

impl PushError {
    /// Whether the failure confirms the delivery address is dead.
    ///
    /// Besides the typed variant, any error whose message carries the
    /// "failed to send notification" signal counts, whatever its source.
    pub fn is_address_dead(&self) -> bool {
        matches!(self, PushError::AddressRejected(_))
            || self
                .to_string()
                .to_ascii_lowercase()
                .contains(FAILED_TO_SEND_MARKER)
    }
}
