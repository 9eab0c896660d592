//! Error types for skel-client.

use thiserror::Error;

use crate::transport::TransportFailure;

/// All errors a remote API call can surface.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request failed twice at the connection level (one reconnect in
    /// between). Callers treat this as "offline".
    #[error("transport error on {method} {path}: {source}")]
    Transport {
        method: &'static str,
        path: String,
        #[source]
        source: TransportFailure,
    },

    /// The server answered with something that is not the expected JSON.
    #[error("protocol error on {path}: {message}")]
    Protocol { path: String, message: String },

    /// A sample-scoped call was made before the sample id was resolved, or
    /// after the client was closed.
    #[error("remote client is not online")]
    NotOnline,
}

impl ClientError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }
}

pub(crate) fn protocol_err(path: &str, message: impl Into<String>) -> ClientError {
    ClientError::Protocol {
        path: path.to_string(),
        message: message.into(),
    }
}
