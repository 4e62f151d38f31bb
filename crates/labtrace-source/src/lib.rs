//! labtrace record sources
//!
//! Everything between the lab platform and the trace engine:
//!
//! - [`raw`]: serde mirrors of platform records
//! - [`adapter`]: normalization into [`records`]
//! - [`RemoteSession`]: async platform access, with [`InMemorySession`]
//! - [`SnapshotLoader`]: fetches a [`TraceSnapshot`] for a set of plans
//! - [`RecordSource`]: the synchronous view the assembler reads
//!
//! # Example
//!
//! ```rust,ignore
//! use labtrace_source::{InMemorySession, SnapshotLoader};
//!
//! let session = InMemorySession::from_json_str(&dump)?;
//! let snapshot = SnapshotLoader::new(&session).load(&plans).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod adapter;
mod error;
mod loader;
mod memory;
pub mod raw;
pub mod records;
mod session;
mod snapshot;

pub use error::SourceError;
pub use loader::SnapshotLoader;
pub use memory::{InMemorySession, RawDump};
pub use records::{
    AgentRecord, ItemBinding, ItemRecord, JobRecord, OperationRecord, PartRecord, PlanRecord,
    SourceRef, UploadLink, UploadRecord,
};
pub use session::{RecordSource, RemoteSession};
pub use snapshot::TraceSnapshot;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
