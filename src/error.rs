//! Error and fatal-condition types.

use thiserror::Error;

/// Reportable failures inside the sync core.
///
/// None of these travel back through the room; they are handed to
/// [`crate::session::SessionShell::report`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("room descriptor for '{room}' could not be parsed: {source}")]
    Descriptor {
        room: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "cannot switch to scene '{target}': previous scene {previous:?} not found (active room '{active}')"
    )]
    MissingPreviousScene {
        target: String,
        previous: Option<String>,
        active: String,
    },

    #[error("no bootstrap is waiting on preloader '{0}'")]
    UnknownPreload(String),

    #[error("send '{act}' on room '{room}' failed: {reason}")]
    Send {
        room: String,
        act: String,
        reason: String,
    },

    #[error("message observer '{observer}' failed: {reason}")]
    Observer { observer: String, reason: String },

    #[error("unknown room '{0}'")]
    UnknownRoom(String),
}

/// Conditions that end the local client state and require a full
/// re-authentication / reload cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalCondition {
    /// The room closed with an abnormal code.
    ConnectionError { code: u16 },
    /// The local entity was removed from the roster.
    SessionEnded,
}

impl std::fmt::Display for FatalCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FatalCondition::ConnectionError { code } => {
                write!(f, "There was a connection error (code {}).", code)
            }
            FatalCondition::SessionEnded => write!(f, "Your session ended, please login again."),
        }
    }
}
