use derive_more::Display;

/// User-initiated actions that are gated by the snapshot's permission data
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
pub enum Action {
    #[display("read message history")]
    ReadHistory,
    #[display("send messages")]
    SendMessage,
    #[display("create invites")]
    CreateInvite,
}

#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("No token provided")]
    MissingCredential,
    #[error("Could not connect to Discord: {0}")]
    ConnectFailure(#[source] crate::Error),
    #[error("Session used before it became ready")]
    SessionNotReady,
    #[error("Bot lacks permission to {action} in #{channel} (missing {missing})")]
    PermissionDenied {
        action: Action,
        channel: String,
        missing: &'static str,
    },
    #[error("Discord rejected the request: {0}")]
    RemoteRejected(#[source] crate::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Interrupted by user")]
    Interrupted,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl TriageError {
    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn permission_denied<T: Into<String>>(action: Action, channel: T, missing: &'static str) -> Self {
        Self::PermissionDenied {
            action,
            channel: channel.into(),
            missing,
        }
    }

    pub fn connect_failure<E: Into<crate::Error>>(err: E) -> Self {
        Self::ConnectFailure(err.into())
    }

    /// Failures that end the whole run rather than a single action
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential | Self::ConnectFailure(_) | Self::SessionNotReady
        )
    }
}
