/// Frontier entry status definitions
///
/// A URL enters the frontier as `Pending` and is resolved exactly once per
/// fetch attempt. `InProgress` only appears when entries are claimed by the
/// concurrent crawl loop.
use std::fmt;

/// Represents the current status of a frontier entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontierStatus {
    // ===== Active States =====
    /// Discovered and waiting to be fetched
    Pending,

    /// Claimed by a crawl worker and currently being fetched
    InProgress,

    // ===== Terminal States =====
    /// Fetched with HTTP 200 and stored
    Success,

    /// Fetch failed; the reason is kept in `last_error`
    Error,
}

impl FrontierStatus {
    /// Returns true if this is a terminal status (never revisited automatically)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for FrontierStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [FrontierStatus; 4] = [
        FrontierStatus::Pending,
        FrontierStatus::InProgress,
        FrontierStatus::Success,
        FrontierStatus::Error,
    ];

    #[test]
    fn test_is_terminal() {
        assert!(!FrontierStatus::Pending.is_terminal());
        assert!(!FrontierStatus::InProgress.is_terminal());
        assert!(FrontierStatus::Success.is_terminal());
        assert!(FrontierStatus::Error.is_terminal());
    }

    #[test]
    fn test_roundtrip_db_string() {
        for status in ALL {
            let parsed = FrontierStatus::from_db_string(status.to_db_string());
            assert_eq!(Some(status), parsed, "Failed roundtrip for {:?}", status);
        }
        assert_eq!(FrontierStatus::from_db_string("processed"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(FrontierStatus::InProgress.to_string(), "in_progress");
        assert_eq!(FrontierStatus::Error.to_string(), "error");
    }
}
