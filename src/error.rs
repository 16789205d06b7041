use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Rejections reported by the slideshow's operator control points.
///
/// None of these are fatal; the caller reports them and carries on.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    #[error("slideshow already running")]
    AlreadyRunning,

    #[error("slideshow already stopped")]
    NotRunning,

    /// The readiness barrier has not finished yet.
    #[error("slideshow is still starting")]
    Starting,

    #[error("slideshow is still stopping")]
    Stopping,

    #[error("slideshow already frozen")]
    AlreadyFrozen,

    #[error("slideshow already unfrozen")]
    NotFrozen,

    /// Shutdown was requested before the show finished starting.
    #[error("slideshow start was cancelled")]
    Cancelled,
}

/// Lifecycle misuse of a fetcher's refresh loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetcherError {
    #[error("refresh loop for {0} already started")]
    AlreadyStarted(String),

    #[error("refresh loop for {0} is not running")]
    NotStarted(String),
}

/// Why a single fetch cycle failed. Callers only ever see a boolean; the
/// variants exist so the logs can say what went wrong.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request builder rejected its own inputs; no network call was made.
    #[error("could not build request: {0:#}")]
    Request(anyhow::Error),

    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("unexpected status code {0}")]
    Status(u16),

    #[error("failed reading response body: {0}")]
    Body(#[source] BoxError),

    /// The body arrived but the parser could not use it.
    #[error("response rejected by parser")]
    Rejected,
}
