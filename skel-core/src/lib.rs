//! skel-core: domain types, settings and logging context shared by the
//! synchronization agent crates.
//!
//! - [`types`]: addresses, annotations, watermark, sample identity
//! - [`config`]: `skelsettings.json` load / save
//! - [`log`]: per-component [`LogContext`]
//! - [`error`]: [`CoreError`]

pub mod config;
pub mod error;
pub mod log;
pub mod types;

pub use config::SkelConfig;
pub use error::CoreError;
pub use log::LogContext;
pub use types::{
    parse_server_timestamp, Address, Annotation, AnnotationKind, InputFile, ProposedName,
    SampleId, SampleIdentity, SyncWatermark,
};
