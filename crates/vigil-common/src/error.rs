use thiserror::Error;

/// Reasons a session record cannot describe a runnable monitoring session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Selector is empty")]
    EmptySelector,

    #[error("Search text is required for mode '{0}'")]
    MissingSearchText(String),

    #[error("Change mode needs the element's initial content")]
    MissingInitialContent,

    #[error("Interval must be a positive number of seconds")]
    ZeroInterval,

    #[error("Session cannot be active after its condition was met")]
    ActiveAfterConditionMet,
}
