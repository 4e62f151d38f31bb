//! labtrace trace assembly
//!
//! Turns the normalized records of a set of plans into a frozen
//! [`ProvenanceGraph`]:
//!
//! - [`resolver`]: per-activity derivation inference
//! - [`TraceAssembler`]: the pass itself, with fix-up hooks
//! - [`check_graph`]: read-only consistency findings
//! - [`TraceConfig`]: TOML configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use labtrace_core::{TraceAssembler, TraceConfig};
//! use labtrace_fixup::standard::standard_pipeline;
//!
//! let config = TraceConfig::from_path("labtrace.toml")?;
//! let mut fixups = standard_pipeline(&config.fixups)?;
//! let graph = TraceAssembler::new(&snapshot)
//!     .with_config(config)
//!     .assemble(&plans, &mut fixups)?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod assembler;
mod check;
mod config;
mod error;
pub mod resolver;

pub use assembler::{assemble, TraceAssembler};
pub use check::{check_graph, CheckReport, Finding};
pub use config::{CheckConfig, ConfigError, TraceConfig};
pub use error::TraceError;
pub use labtrace_model::ProvenanceGraph;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
