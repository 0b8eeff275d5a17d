use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// No notification backend on this platform. Terminal for the session.
    #[error("This system does not support desktop notifications.")]
    Unsupported,

    /// The user refused notifications. Terminal until changed outside this program.
    #[error("Notifications are blocked. Please enable them in your system settings to receive food alerts.")]
    PermissionDenied,

    #[error("audio output unavailable: {0}")]
    AudioUnavailable(String),

    #[error("failed to present notification: {0}")]
    Presentation(String),

    #[error("failed to open {url}: {reason}")]
    Dispatch { url: String, reason: String },
}

impl NotifyError {
    /// Stable snake_case code for the HTTP error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            NotifyError::Unsupported => "notifications_unsupported",
            NotifyError::PermissionDenied => "notifications_blocked",
            NotifyError::AudioUnavailable(_) => "audio_unavailable",
            NotifyError::Presentation(_) => "presentation_failed",
            NotifyError::Dispatch { .. } => "dispatch_failed",
        }
    }
}
