//! In-memory stand-in for the collaboration server.
//!
//! Clones share one [`FakeServer`], so a test can hand a [`FakeRemote`] to
//! the agent and still inspect what reached the server.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, TimeZone, Utc};
use skel_client::{ClientError, RemoteApi, TransportFailure};
use skel_core::{Address, Annotation, AnnotationKind, ProposedName, SampleId, SyncWatermark};

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 5, 1, 10, 0, 0).unwrap() + Duration::seconds(secs)
}

#[derive(Debug, Default)]
pub struct FakeServer {
    /// md5 -> sample id
    pub samples: HashMap<String, u64>,
    /// On upload, register this md5 under this id.
    pub register_on_upload: Option<(String, u64)>,
    pub uploads: Vec<(String, usize)>,
    pub comments: Vec<Annotation>,
    pub names: Vec<Annotation>,
    pub types: Vec<Annotation>,
    pub structs: Vec<String>,
    pub abstract_text: String,
    pub abstract_pushes: usize,
    pub proposed: Vec<ProposedName>,
    pub fetches: usize,
    pub closes: usize,
    /// Seconds after `ts(0)` handed to the next push.
    pub clock: i64,
    /// Every call fails at the transport level.
    pub unreachable: bool,
    /// Push answers `{"result": false}`.
    pub reject_pushes: bool,
}

impl FakeServer {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        ts(self.clock)
    }

    fn store(&mut self, kind: AnnotationKind, address: Address, payload: &str) -> bool {
        if self.reject_pushes {
            return false;
        }
        let at = self.tick();
        let record = Annotation::remote(address, kind, payload, at);
        match kind {
            AnnotationKind::Comment => self.comments.push(record),
            AnnotationKind::Name => self.names.push(record),
            AnnotationKind::Type => self.types.push(record),
        }
        true
    }

    pub fn pushed(&self, kind: AnnotationKind) -> Vec<(Address, String)> {
        let records = match kind {
            AnnotationKind::Comment => &self.comments,
            AnnotationKind::Name => &self.names,
            AnnotationKind::Type => &self.types,
        };
        records.iter().map(|a| (a.address, a.payload.clone())).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeRemote {
    server: Arc<Mutex<FakeServer>>,
    sample: Option<SampleId>,
    pub closed: bool,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn online(sample: u64) -> Self {
        let mut remote = Self::new();
        remote.attach_sample(SampleId(sample));
        remote
    }

    pub fn server(&self) -> MutexGuard<'_, FakeServer> {
        self.server.lock().unwrap()
    }

    /// A second connection to the same server, not yet attached.
    pub fn peer(&self) -> Self {
        Self {
            server: Arc::clone(&self.server),
            sample: None,
            closed: false,
        }
    }

    /// A second connection already attached to this one's sample.
    pub fn peer_online(&self) -> Self {
        let mut peer = self.peer();
        peer.sample = self.sample;
        peer
    }

    pub fn seed(&self, kind: AnnotationKind, address: u64, payload: &str, at: DateTime<Utc>) {
        let record = Annotation::remote(address, kind, payload, at);
        let mut server = self.server();
        match kind {
            AnnotationKind::Comment => server.comments.push(record),
            AnnotationKind::Name => server.names.push(record),
            AnnotationKind::Type => server.types.push(record),
        }
    }

    fn check(&self) -> Result<(), ClientError> {
        if self.server().unreachable {
            return Err(ClientError::Transport {
                method: "GET",
                path: "/fake".to_string(),
                source: TransportFailure::new("connection refused"),
            });
        }
        if self.sample.is_none() {
            return Err(ClientError::NotOnline);
        }
        Ok(())
    }

    fn since(records: &[Annotation], since: &SyncWatermark) -> Vec<Annotation> {
        records
            .iter()
            .filter(|a| a.timestamp.map_or(false, |t| t >= since.get()))
            .cloned()
            .collect()
    }
}

impl RemoteApi for FakeRemote {
    fn is_online(&self) -> bool {
        self.sample.is_some()
    }

    fn sample_id(&self) -> Option<SampleId> {
        self.sample
    }

    fn attach_sample(&mut self, sample: SampleId) {
        self.sample = Some(sample);
    }

    fn close(&mut self) {
        self.sample = None;
        self.closed = true;
        self.server().closes += 1;
    }

    fn push_comment(&mut self, address: Address, text: &str) -> Result<bool, ClientError> {
        self.check()?;
        Ok(self.server().store(AnnotationKind::Comment, address, text))
    }

    fn push_name(&mut self, address: Address, name: &str) -> Result<bool, ClientError> {
        self.check()?;
        Ok(self.server().store(AnnotationKind::Name, address, name))
    }

    fn push_type(&mut self, address: Address, type_string: &str) -> Result<bool, ClientError> {
        self.check()?;
        Ok(self.server().store(AnnotationKind::Type, address, type_string))
    }

    fn fetch_comments_since(&mut self, since: &SyncWatermark) -> Result<Vec<Annotation>, ClientError> {
        self.check()?;
        let mut server = self.server();
        server.fetches += 1;
        Ok(Self::since(&server.comments, since))
    }

    fn fetch_names_since(&mut self, since: &SyncWatermark) -> Result<Vec<Annotation>, ClientError> {
        self.check()?;
        let mut server = self.server();
        server.fetches += 1;
        Ok(Self::since(&server.names, since))
    }

    fn fetch_proposed_names(&mut self) -> Result<Vec<ProposedName>, ClientError> {
        self.check()?;
        Ok(self.server().proposed.clone())
    }

    fn get_abstract(&mut self) -> Result<String, ClientError> {
        self.check()?;
        Ok(self.server().abstract_text.clone())
    }

    fn push_abstract(&mut self, text: &str) -> Result<bool, ClientError> {
        self.check()?;
        let mut server = self.server();
        server.abstract_text = text.to_string();
        server.abstract_pushes += 1;
        Ok(true)
    }

    fn create_struct(&mut self, name: &str) -> Result<Option<u64>, ClientError> {
        self.check()?;
        let mut server = self.server();
        server.structs.push(name.to_string());
        Ok(Some(server.structs.len() as u64))
    }

    fn resolve_sample_id(&mut self, md5: &str) -> Result<Option<SampleId>, ClientError> {
        if self.server().unreachable {
            return Err(ClientError::Transport {
                method: "GET",
                path: format!("/api/1.0/samples/{md5}/"),
                source: TransportFailure::new("connection refused"),
            });
        }
        Ok(self.server().samples.get(md5).copied().map(SampleId))
    }

    fn upload_sample(&mut self, file_name: &str, bytes: &[u8]) -> Result<(), ClientError> {
        let mut server = self.server();
        server.uploads.push((file_name.to_string(), bytes.len()));
        if let Some((md5, id)) = server.register_on_upload.clone() {
            server.samples.insert(md5, id);
        }
        Ok(())
    }
}
