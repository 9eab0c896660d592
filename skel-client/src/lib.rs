//! # skel-client
//!
//! Typed client for the collaboration server's JSON API.
//!
//! [`RemoteClient`] wraps a keep-alive [`Transport`] (by default
//! [`UreqTransport`]) and exposes the operations the sync engine needs through
//! the [`RemoteApi`] trait. A stale connection is reconnected and the request
//! retried exactly once; gzip-encoded answers are decoded transparently.

pub mod client;
pub mod error;
pub mod transport;
mod wire;

pub use client::{multipart_body, ClientSettings, RemoteApi, RemoteClient, SAMPLES_ENDPOINT};
pub use error::ClientError;
pub use transport::{HttpRequest, HttpResponse, Method, Transport, TransportFailure, UreqTransport};
