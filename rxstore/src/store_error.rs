use thiserror::Error;

/// Errors surfaced while turning actions into states.
///
/// Failures of a single action (everything except [`StoreError::Recovery`]) are caught by the
/// store and handed to its recovery handler. A `Recovery` error is fatal and ends the state feed.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StoreError {
    /// A general failure with a message describing what went wrong.
    #[error("{0}")]
    Error(String),

    /// The reducer panicked while being invoked.
    #[error("reducer panicked: {0}")]
    Panicked(String),

    /// A result completed without producing the value that was awaited.
    #[error("sequence completed without a value!")]
    Empty,

    /// The recovery handler itself failed.
    #[error("recovery failed: {0}")]
    Recovery(Box<StoreError>),

    /// The store pipeline is no longer running.
    #[error("store is closed!")]
    Closed,
}

impl StoreError {
    pub fn error(message: impl Into<String>) -> Self {
        StoreError::Error(message.into())
    }

    pub fn recovery(source: StoreError) -> Self {
        StoreError::Recovery(Box::new(source))
    }

    /// Returns true if this error is a general error with a message.
    pub fn is_error(&self) -> bool {
        matches!(self, StoreError::Error(_))
    }

    pub fn is_panicked(&self) -> bool {
        matches!(self, StoreError::Panicked(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, StoreError::Empty)
    }

    /// Returns true if the error is fatal for the state feed.
    pub fn is_recovery(&self) -> bool {
        matches!(self, StoreError::Recovery(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, StoreError::Closed)
    }
}

impl From<&str> for StoreError {
    fn from(message: &str) -> Self {
        StoreError::Error(message.to_string())
    }
}

impl From<String> for StoreError {
    fn from(message: String) -> Self {
        StoreError::Error(message)
    }
}

/// Runs `f`, turning a panic into a [`StoreError::Panicked`].
pub(crate) fn catch_panic<T>(f: impl FnOnce() -> T) -> Result<T, StoreError> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        StoreError::Panicked(message)
    })
}
