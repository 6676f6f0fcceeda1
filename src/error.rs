//! Error taxonomy shared by every backend

use crate::capability::BackendFamily;

/// Errors raised by canvases, contexts and backends
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The native window could not be created
    #[error("window creation failed: {0}")]
    WindowCreationFailed(String),

    /// The GL configuration cannot be satisfied or the native context failed
    #[error("GL context creation failed: {0}")]
    ContextCreationFailed(String),

    /// The context token is owned by another backend family
    #[error("cannot share a {owner} context with a {requested} canvas")]
    IncompatibleShare {
        /// Family that claimed the token first
        owner: BackendFamily,
        /// Family of the canvas asking to share
        requested: BackendFamily,
    },

    /// The request conflicts with the canvas state or backend capabilities
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The canvas has already been closed
    #[error("canvas is closed")]
    CanvasClosed,

    /// The requested backend is not available on this platform/build
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// A native call failed outside of construction
    #[error("native error: {0}")]
    Native(String),

    /// Configuration could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidOperation(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incompatible_share_message() {
        let err = Error::IncompatibleShare {
            owner: BackendFamily::Gtk,
            requested: BackendFamily::Native,
        };
        assert_eq!(
            err.to_string(),
            "cannot share a gtk context with a native canvas"
        );
    }

    #[test]
    fn test_toml_error_is_config() {
        let err: Error = toml::from_str::<toml::Value>("= broken").unwrap_err().into();
        assert!(matches!(err, Error::Config(_)));
    }
}
