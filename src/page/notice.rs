use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// A transient message about the last action; it stops showing once its
/// time-to-live has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, message)
    }

    fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            raised_at: Utc::now(),
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.raised_at < ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_ttl() {
        let n = Notice::error("boom");
        let ttl = Duration::seconds(4);
        assert!(n.is_live(n.raised_at, ttl));
        assert!(n.is_live(n.raised_at + Duration::milliseconds(3999), ttl));
        assert!(!n.is_live(n.raised_at + ttl, ttl));
    }
}
