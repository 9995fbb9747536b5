use thiserror::Error;

use crate::sync::CrmError;

/// Errors produced by the autofill engine
#[derive(Debug, Error)]
pub enum AutofillError {
    /// Failed to launch the browser
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Failed to connect to an existing browser
    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    /// Tab lookup or manipulation failed
    #[error("Tab operation failed: {0}")]
    TabOperationFailed(String),

    /// A selector could not be parsed or is not supported by the page
    #[error("Invalid selector '{0}'")]
    InvalidSelector(String),

    /// A node handle no longer refers to an attached element
    #[error("Stale node handle {0}")]
    StaleNode(usize),

    /// An element the caller required was not present
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Script evaluation inside the page failed
    #[error("Page evaluation failed: {0}")]
    EvaluationFailed(String),

    /// The tab does not host an injectable document (chrome://, file://, about:...)
    #[error("Cannot inject into this page type: {0}")]
    UnsupportedPage(String),

    /// No adapter is registered for the page or the requested key
    #[error("Unsupported site: {0}")]
    UnsupportedSite(String),

    /// Injection of the content runtime failed
    #[error("Injection failed: {0}")]
    InjectionFailed(String),

    /// The readiness handshake gave up
    #[error("Content script not ready after {attempts} attempts")]
    NotReady { attempts: u32 },

    /// A message could not be delivered to or answered by the content runtime
    #[error("Communication with content script failed: {0}")]
    Communication(String),

    /// An adapter step failed while writing to the page
    #[error("Adapter '{site}' failed: {reason}")]
    AdapterFailed { site: String, reason: String },

    /// Image download failed
    #[error("Failed to fetch image {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    /// Persistent storage failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// CRM sync or authentication failure
    #[error(transparent)]
    Crm(#[from] CrmError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AutofillError>;

impl AutofillError {
    /// Whether the failure means the content runtime is unavailable and the user should
    /// refresh the page before retrying.
    pub fn is_runtime_unavailable(&self) -> bool {
        matches!(
            self,
            AutofillError::UnsupportedPage(_) | AutofillError::InjectionFailed(_) | AutofillError::NotReady { .. }
        )
    }
}
