//! labtrace identity registry
//!
//! Deduplicates provenance nodes by stable key and accumulates the edges,
//! plans and annotations of one assembly pass.
//!
//! - [`IdentityRegistry`]: keyed arena, at most one node per key
//! - [`TraceBuilder`]: registry plus checked edge set, frozen into a
//!   [`labtrace_model::ProvenanceGraph`]

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod builder;
mod error;
mod registry;

pub use builder::TraceBuilder;
pub use error::RegistryError;
pub use registry::IdentityRegistry;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
