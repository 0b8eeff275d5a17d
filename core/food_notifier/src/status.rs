use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Success,
    Error,
    Info,
}

impl StatusKind {
    pub fn icon(self) -> &'static str {
        match self {
            StatusKind::Success => "✅",
            StatusKind::Error => "❌",
            StatusKind::Info => "🔔",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub kind: StatusKind,
    pub icon: &'static str,
    pub message: String,
}

/// Surface that reflects the notifier's state to whoever operates it.
pub trait StatusDisplay: Send + Sync {
    fn update(&self, kind: StatusKind, message: &str);
}

/// Latest status line, readable by the control surface.
pub struct StatusBoard {
    tx: watch::Sender<Option<StatusLine>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn current(&self) -> Option<StatusLine> {
        self.tx.borrow().clone()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusDisplay for StatusBoard {
    fn update(&self, kind: StatusKind, message: &str) {
        info!("status: {} {message}", kind.icon());
        self.tx.send_replace(Some(StatusLine {
            kind,
            icon: kind.icon(),
            message: message.to_string(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_keeps_latest_line_with_icon() {
        let board = StatusBoard::new();
        assert!(board.current().is_none());

        board.update(StatusKind::Info, "first");
        board.update(StatusKind::Error, "blocked");
        let line = board.current().unwrap();
        assert_eq!(line.kind, StatusKind::Error);
        assert_eq!(line.icon, "❌");
        assert_eq!(line.message, "blocked");
    }
}
