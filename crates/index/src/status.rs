use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the autocomplete index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildState {
    /// Never built.
    None,
    Building,
    Ready,
    /// Ready, but the configuration changed since the last build.
    ReadyConfig,
    Canceled,
    Error,
}

impl BuildState {
    /// Queries are served only in these states.
    #[must_use]
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ready | Self::ReadyConfig)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Building => "BUILDING",
            Self::Ready => "READY",
            Self::ReadyConfig => "READY_CONFIG",
            Self::Canceled => "CANCELED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStatus {
    pub state: BuildState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IndexStatus {
    #[must_use]
    pub fn new(state: BuildState) -> Self {
        Self { state, error: None }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            state: BuildState::Error,
            error: Some(message.into()),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.state.is_ok()
    }
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.state, &self.error) {
            (BuildState::Error, Some(message)) => write!(f, "ERROR: {message}"),
            (state, _) => write!(f, "{state}"),
        }
    }
}

/// Inputs of the status derivation, in the order they are consulted.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StatusInputs {
    pub has_error: bool,
    pub has_task: bool,
    pub has_built: bool,
    pub cancel_requested: bool,
    pub task_finished: bool,
    pub config_drift: bool,
}

pub(crate) fn derive_state(inputs: StatusInputs) -> BuildState {
    let ready = if inputs.config_drift {
        BuildState::ReadyConfig
    } else {
        BuildState::Ready
    };
    if inputs.has_error {
        BuildState::Error
    } else if !inputs.has_task {
        if inputs.has_built {
            ready
        } else {
            BuildState::None
        }
    } else if inputs.cancel_requested {
        BuildState::Canceled
    } else if inputs.task_finished {
        ready
    } else {
        BuildState::Building
    }
}
