//! HTTP transport seam.
//!
//! [`RemoteClient`](crate::RemoteClient) speaks to the server through the
//! [`Transport`] trait so the retry, decoding and JSON layers can be driven
//! without a network. [`UreqTransport`] is the production implementation: a
//! `ureq::Agent` whose connection pool keeps the session alive between calls.

use std::fmt;
use std::io::Read;

use flate2::read::GzDecoder;
use thiserror::Error;

/// HTTP verbs used by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully built request; `path` is absolute from the server root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response as it came off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_encoding: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_encoding: None,
            body: body.into(),
        }
    }

    /// Body with any `Content-Encoding: gzip` removed.
    pub fn decoded_body(&self) -> std::io::Result<Vec<u8>> {
        match self.content_encoding.as_deref() {
            Some(enc) if enc.eq_ignore_ascii_case("gzip") => {
                let mut decoder = GzDecoder::new(&self.body[..]);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out)?;
                Ok(out)
            }
            _ => Ok(self.body.clone()),
        }
    }
}

/// Connection-level failure: refused, reset, or a pooled connection that
/// went stale.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportFailure {
    pub message: String,
}

impl TransportFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub trait Transport: Send {
    fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportFailure>;

    /// Drop pooled connections so the next `send` dials afresh.
    fn reconnect(&mut self);
}

// ---------------------------------------------------------------------------
// ureq
// ---------------------------------------------------------------------------

/// Keep-alive HTTP(S) transport over a `ureq::Agent`.
pub struct UreqTransport {
    base_url: String,
    agent: ureq::Agent,
}

impl UreqTransport {
    /// `base_url` is `scheme://host:port` without a trailing slash.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent: build_agent(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn build_agent() -> ureq::Agent {
    ureq::AgentBuilder::new().build()
}

impl Transport for UreqTransport {
    fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportFailure> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut call = self.agent.request(request.method.as_str(), &url);
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }

        let result = if request.body.is_empty() {
            call.call()
        } else {
            call.send_bytes(&request.body)
        };
        // Non-2xx still carries a body the caller wants to see.
        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(err)) => return Err(TransportFailure::new(err.to_string())),
        };

        let status = response.status();
        let content_encoding = response.header("Content-Encoding").map(str::to_owned);
        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| TransportFailure::new(format!("failed to read response body: {e}")))?;
        Ok(HttpResponse {
            status,
            content_encoding,
            body,
        })
    }

    fn reconnect(&mut self) {
        self.agent = build_agent();
    }
}
