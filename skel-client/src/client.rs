//! Typed remote API client.
//!
//! ## Request protocol
//!
//! 1. Serialize the payload to JSON (sample uploads use multipart instead).
//! 2. Send through the [`Transport`]; on a connection failure reconnect once
//!    and resend. A second failure is [`ClientError::Transport`].
//! 3. Log a non-200 status but keep going: the server puts the reason in
//!    the JSON body.
//! 4. Strip `Content-Encoding: gzip` if present.
//! 5. Parse JSON; anything else is [`ClientError::Protocol`].
//!
//! Sample-scoped resources live under
//! `<remote_path>samples/<sample_id>/<resource>/`.

use serde::de::DeserializeOwned;
use serde::Serialize;

use skel_core::{
    Address, Annotation, AnnotationKind, LogContext, ProposedName, SampleId, SkelConfig,
    SyncWatermark,
};

use crate::error::{protocol_err, ClientError};
use crate::transport::{HttpRequest, HttpResponse, Method, Transport, UreqTransport};
use crate::wire;

/// Sample lookup and upload are not scoped by `poli_remote_path`.
pub const SAMPLES_ENDPOINT: &str = "/api/1.0/samples/";

/// Fixed multipart boundary for sample uploads.
pub const MULTIPART_BOUNDARY: &str = "70f6e331562f4b8f98e5f9590e0ffb8e";

/// Operations the sync engine needs from the server.
///
/// Push operations return the server's acceptance flag: `Ok(false)` means
/// the server rejected the annotation (already logged), not a failure.
pub trait RemoteApi: Send {
    /// `true` once a sample id is attached and until [`close`](Self::close).
    fn is_online(&self) -> bool;
    fn sample_id(&self) -> Option<SampleId>;
    /// Scope subsequent calls to `sample`; marks the client online.
    fn attach_sample(&mut self, sample: SampleId);
    /// Drop the connection and forget the sample.
    fn close(&mut self);

    fn push_comment(&mut self, address: Address, text: &str) -> Result<bool, ClientError>;
    fn push_name(&mut self, address: Address, name: &str) -> Result<bool, ClientError>;
    /// `type_string` must already be normalised; it is sent verbatim.
    fn push_type(&mut self, address: Address, type_string: &str) -> Result<bool, ClientError>;
    fn fetch_comments_since(&mut self, since: &SyncWatermark) -> Result<Vec<Annotation>, ClientError>;
    fn fetch_names_since(&mut self, since: &SyncWatermark) -> Result<Vec<Annotation>, ClientError>;
    fn fetch_proposed_names(&mut self) -> Result<Vec<ProposedName>, ClientError>;
    fn get_abstract(&mut self) -> Result<String, ClientError>;
    fn push_abstract(&mut self, text: &str) -> Result<bool, ClientError>;
    fn create_struct(&mut self, name: &str) -> Result<Option<u64>, ClientError>;

    /// Look a binary up by lowercase MD5 hex. Only connection failures are
    /// errors; "not found" and malformed answers are `Ok(None)`.
    fn resolve_sample_id(&mut self, md5: &str) -> Result<Option<SampleId>, ClientError>;
    fn upload_sample(&mut self, file_name: &str, bytes: &[u8]) -> Result<(), ClientError>;
}

/// Connection settings the client needs from [`SkelConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_key: String,
    /// Normalised `/prefix/`.
    pub remote_prefix: String,
    pub debug_http: bool,
}

impl From<&SkelConfig> for ClientSettings {
    fn from(config: &SkelConfig) -> Self {
        Self {
            api_key: config.poli_apikey.clone(),
            remote_prefix: config.remote_prefix(),
            debug_http: config.debug_http,
        }
    }
}

/// Remote API client over a keep-alive transport.
///
/// Each component that talks to the server owns its own client; clients are
/// never shared between threads.
pub struct RemoteClient<T: Transport = UreqTransport> {
    transport: T,
    settings: ClientSettings,
    sample_id: Option<SampleId>,
    log: LogContext,
}

impl RemoteClient<UreqTransport> {
    /// Client for the server named in `config`.
    pub fn connect(config: &SkelConfig, log: LogContext) -> Self {
        let transport = UreqTransport::new(config.base_url());
        if config.debug_http {
            log.in_scope(|| tracing::info!(url = transport.base_url(), "connecting using plain HTTP"));
        }
        Self::with_transport(transport, ClientSettings::from(config), log)
    }
}

impl<T: Transport> RemoteClient<T> {
    pub fn with_transport(transport: T, settings: ClientSettings, log: LogContext) -> Self {
        Self {
            transport,
            settings,
            sample_id: None,
            log,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// `<remote_path>samples/<id>/<resource>/`
    pub fn endpoint(&self, resource: &str) -> Result<String, ClientError> {
        let sample = self.sample_id.ok_or(ClientError::NotOnline)?;
        Ok(format!(
            "{}samples/{}/{}/",
            self.settings.remote_prefix,
            sample,
            resource.trim_matches('/')
        ))
    }

    // -----------------------------------------------------------------------
    // Request plumbing
    // -----------------------------------------------------------------------

    fn json_headers(&self) -> Vec<(String, String)> {
        vec![
            ("Accept-Encoding".to_string(), "gzip, deflate".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "*/*;q=0.8".to_string()),
            ("Accept-Language".to_string(), "en-US,en;q=0.5".to_string()),
            ("Connection".to_string(), "Keep-Alive".to_string()),
            ("X-API-Key".to_string(), self.settings.api_key.clone()),
        ]
    }

    /// Send with exactly one reconnect-and-retry on a connection failure.
    fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
        let first = self.transport.send(request);
        let response = match first {
            Ok(response) => response,
            Err(failure) => {
                self.log.in_scope(|| {
                    tracing::warn!(
                        method = %request.method,
                        path = %request.path,
                        error = %failure,
                        "error during request, reconnecting and retrying",
                    )
                });
                self.transport.reconnect();
                self.transport
                    .send(request)
                    .map_err(|source| ClientError::Transport {
                        method: request.method.as_str(),
                        path: request.path.clone(),
                        source,
                    })?
            }
        };

        if self.settings.debug_http {
            self.log.in_scope(|| {
                tracing::debug!(
                    method = %request.method,
                    path = %request.path,
                    status = response.status,
                    "http exchange",
                )
            });
        }
        if response.status != 200 {
            self.log.in_scope(|| {
                tracing::error!(
                    method = %request.method,
                    path = %request.path,
                    status = response.status,
                    "request did not go as expected",
                )
            });
        }
        Ok(response)
    }

    fn request<B: Serialize, R: DeserializeOwned>(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<R, ClientError> {
        let body = match body {
            Some(body) => serde_json::to_vec(body).map_err(|e| protocol_err(path, e.to_string()))?,
            None => Vec::new(),
        };
        let request = HttpRequest {
            method,
            path: path.to_string(),
            headers: self.json_headers(),
            body,
        };
        let response = self.send(&request)?;
        decode_json(path, &response)
    }

    fn get<R: DeserializeOwned>(&mut self, path: &str) -> Result<R, ClientError> {
        self.request::<(), R>(Method::Get, path, None)
    }

    fn post<B: Serialize, R: DeserializeOwned>(&mut self, path: &str, body: &B) -> Result<R, ClientError> {
        self.request(Method::Post, path, Some(body))
    }

    fn fetch_since(
        &mut self,
        resource: &str,
        kind: AnnotationKind,
        since: &SyncWatermark,
    ) -> Result<Vec<Annotation>, ClientError> {
        let path = format!("{}?timestamp={}", self.endpoint(resource)?, since.to_query());
        let records = match kind {
            AnnotationKind::Comment => self.get::<wire::CommentsPage>(&path)?.comments,
            _ => self.get::<wire::NamesPage>(&path)?.names,
        };
        let total = records.len();
        let annotations: Vec<Annotation> = records
            .into_iter()
            .filter_map(|record| record.into_annotation(kind))
            .collect();
        if annotations.len() != total {
            self.log.in_scope(|| {
                tracing::warn!(
                    resource,
                    dropped = total - annotations.len(),
                    "skipped remote records with unparseable timestamps",
                )
            });
        }
        Ok(annotations)
    }

    fn log_ack(&self, accepted: bool, what: &str, address: Address, payload: &str) {
        self.log.in_scope(|| {
            if accepted {
                tracing::debug!(%address, payload, "{what} sent");
            } else {
                tracing::error!(%address, payload, "server rejected {what}");
            }
        });
    }
}

impl<T: Transport> RemoteApi for RemoteClient<T> {
    fn is_online(&self) -> bool {
        self.sample_id.is_some()
    }

    fn sample_id(&self) -> Option<SampleId> {
        self.sample_id
    }

    fn attach_sample(&mut self, sample: SampleId) {
        self.log.record_sample(sample);
        self.sample_id = Some(sample);
    }

    fn close(&mut self) {
        self.log.in_scope(|| tracing::debug!("closing connection"));
        self.transport.reconnect();
        self.sample_id = None;
    }

    fn push_comment(&mut self, address: Address, text: &str) -> Result<bool, ClientError> {
        let path = self.endpoint("comments")?;
        let ack: wire::Ack = self.post(
            &path,
            &wire::CommentPush {
                address: address.0,
                comment: text,
            },
        )?;
        self.log_ack(ack.result, "comment", address, text);
        Ok(ack.result)
    }

    fn push_name(&mut self, address: Address, name: &str) -> Result<bool, ClientError> {
        let path = self.endpoint("names")?;
        let ack: wire::Ack = self.post(
            &path,
            &wire::NamePush {
                address: address.0,
                name,
            },
        )?;
        self.log_ack(ack.result, "name", address, name);
        Ok(ack.result)
    }

    fn push_type(&mut self, address: Address, type_string: &str) -> Result<bool, ClientError> {
        let path = self.endpoint("types")?;
        let ack: wire::Ack = self.post(
            &path,
            &wire::TypePush {
                address: address.0,
                type_string,
            },
        )?;
        self.log_ack(ack.result, "type", address, type_string);
        Ok(ack.result)
    }

    fn fetch_comments_since(&mut self, since: &SyncWatermark) -> Result<Vec<Annotation>, ClientError> {
        self.fetch_since("comments", AnnotationKind::Comment, since)
    }

    fn fetch_names_since(&mut self, since: &SyncWatermark) -> Result<Vec<Annotation>, ClientError> {
        self.fetch_since("names", AnnotationKind::Name, since)
    }

    fn fetch_proposed_names(&mut self) -> Result<Vec<ProposedName>, ClientError> {
        let path = self.endpoint("functions/proposednames")?;
        let page: wire::ProposedFunctions = self.get(&path)?;
        Ok(page.functions.into_iter().flat_map(|f| f.into_rows()).collect())
    }

    fn get_abstract(&mut self) -> Result<String, ClientError> {
        let path = self.endpoint("abstract")?;
        let page: wire::AbstractPage = self.get(&path)?;
        Ok(page.text.unwrap_or_default())
    }

    fn push_abstract(&mut self, text: &str) -> Result<bool, ClientError> {
        let path = self.endpoint("abstract")?;
        let ack: wire::Ack = self.post(&path, &wire::AbstractPush { text })?;
        self.log.in_scope(|| {
            if ack.result {
                tracing::debug!("abstract sent");
            } else {
                tracing::error!("server rejected abstract");
            }
        });
        Ok(ack.result)
    }

    fn create_struct(&mut self, name: &str) -> Result<Option<u64>, ClientError> {
        let path = self.endpoint("structs")?;
        let created: wire::StructCreated = self.post(&path, &wire::StructCreate { name })?;
        if !created.result {
            self.log
                .in_scope(|| tracing::error!(name, "server rejected structure creation"));
            return Ok(None);
        }
        Ok(created.structs.first().map(|s| s.id))
    }

    fn resolve_sample_id(&mut self, md5: &str) -> Result<Option<SampleId>, ClientError> {
        let path = format!("{SAMPLES_ENDPOINT}{}/", md5.to_ascii_lowercase());
        match self.get::<wire::SampleLookup>(&path) {
            Ok(lookup) => Ok(lookup.sample_id.map(SampleId)),
            Err(err @ ClientError::Transport { .. }) => Err(err),
            Err(err) => {
                self.log
                    .in_scope(|| tracing::debug!(error = %err, md5, "sample lookup returned no id"));
                Ok(None)
            }
        }
    }

    fn upload_sample(&mut self, file_name: &str, bytes: &[u8]) -> Result<(), ClientError> {
        let request = HttpRequest {
            method: Method::Post,
            path: SAMPLES_ENDPOINT.to_string(),
            headers: vec![
                ("Accept-Encoding".to_string(), "gzip, deflate".to_string()),
                ("X-API-Key".to_string(), self.settings.api_key.clone()),
                (
                    "Content-Type".to_string(),
                    format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
                ),
            ],
            body: multipart_body(MULTIPART_BOUNDARY, file_name, bytes),
        };
        let response = self.send(&request)?;
        if let Err(err) = decode_json::<serde_json::Value>(SAMPLES_ENDPOINT, &response) {
            self.log
                .in_scope(|| tracing::error!(error = %err, "cannot load JSON answer to sample upload"));
        }
        Ok(())
    }
}

/// Build the two-field `multipart/form-data` body (`filename`, `file`).
pub fn multipart_body(boundary: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"filename\"\r\n\r\n");
    body.extend_from_slice(file_name.as_bytes());
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"file\"; filename=\"file\"\r\n");
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

fn decode_json<R: DeserializeOwned>(path: &str, response: &HttpResponse) -> Result<R, ClientError> {
    let body = response
        .decoded_body()
        .map_err(|e| protocol_err(path, format!("cannot decode body: {e}")))?;
    serde_json::from_slice(&body).map_err(|e| {
        protocol_err(
            path,
            format!("status {}: unexpected JSON ({e})", response.status),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_body_layout() {
        let body = multipart_body("B", "a.exe", b"MZ");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--B\r\nContent-Disposition: form-data; name=\"filename\"\r\n\r\na.exe\r\n"));
        assert!(text.contains("name=\"file\"; filename=\"file\""));
        assert!(text.ends_with("MZ\r\n--B--\r\n"));
    }

    #[test]
    fn decode_json_reports_status_on_garbage() {
        let response = HttpResponse::json(500, "<html>");
        let err = decode_json::<wire::Ack>("/x/", &response).unwrap_err();
        assert!(err.to_string().contains("status 500"));
    }
}
