//! Error types for the two external capabilities.
//!
//! Neither error is fatal: the poller logs them and moves on.  Startup and
//! configuration problems use [`anyhow`] instead and live in `main`/`config`.

use thiserror::Error;

/// A feed adapter could not produce items for an account.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not parse feed: {0}")]
    Parse(#[from] rss::Error),

    #[error("invalid feed url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// A dispatcher could not deliver one message.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("delivery request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("destination rejected message with status {0}")]
    Status(reqwest::StatusCode),

    #[error("could not write message: {0}")]
    Io(#[from] std::io::Error),
}
