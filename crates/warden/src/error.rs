/// Errors that can occur while relaying logs or enforcing team policy.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("transport error calling {endpoint}: {reason}")]
    Transport {
        endpoint: String,
        reason: String,
        /// Timeouts, connection failures and 5xx/429 responses are transient.
        transient: bool,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("unexpected HTTP status {status} from {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("malformed payload from {endpoint}: {reason}")]
    MalformedPayload {
        endpoint: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("persistence error: {reason}")]
    PersistenceError {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },
}

impl WardenError {
    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { transient, .. } => *transient,
            Self::UnexpectedStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn persistence(reason: impl Into<String>, source: sqlx::Error) -> Self {
        Self::PersistenceError {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = WardenError::UnexpectedStatus {
            endpoint: "/joinlogs".into(),
            status: 403,
        };
        assert_eq!(err.to_string(), "unexpected HTTP status 403 from /joinlogs");

        let err = WardenError::NotFound {
            what: "roblox user",
            name: "Builderman".into(),
        };
        assert_eq!(err.to_string(), "roblox user not found: Builderman");
    }

    #[test]
    fn transient_classification() {
        let throttled = WardenError::UnexpectedStatus {
            endpoint: "/command".into(),
            status: 429,
        };
        assert!(throttled.is_transient());

        let rejected = WardenError::UnexpectedStatus {
            endpoint: "/command".into(),
            status: 400,
        };
        assert!(!rejected.is_transient());

        let timeout = WardenError::Transport {
            endpoint: "/command".into(),
            reason: "timed out".into(),
            transient: true,
            source: None,
        };
        assert!(timeout.is_transient());
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WardenError>();
    }
}
