//! labtrace fix-up units
//!
//! Heuristics that correct a trace while it is assembled. A unit implements
//! [`Fixup`] and declares the hooks it uses in a [`HookSet`]; units are run
//! in registration order by a [`FixupPipeline`].
//!
//! # Hooks
//!
//! - `before_resolve`: inject synthetic bindings on an activity
//! - `after_resolve`: add, remove or redirect proposed derivations
//! - `on_item_interned`: correct an item's descriptive attributes
//! - `on_attach`: redirect or skip an upload's attachment
//!
//! Units only see the pass through a [`FixupContext`], so every node they
//! create goes through the identity registry.
//!
//! # Example
//!
//! ```rust,ignore
//! use labtrace_fixup::standard::{standard_pipeline, StandardFixupConfig};
//!
//! let config = StandardFixupConfig::default().with_pass_through("Transfer to 96 Well Plate");
//! let mut pipeline = standard_pipeline(&config)?;
//! let graph = labtrace_core::assemble(&snapshot, &plans, &mut pipeline)?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod context;
mod derivations;
mod error;
mod hooks;
mod pipeline;
pub mod standard;
mod unit;

pub use context::FixupContext;
pub use derivations::{DerivationSet, ProposedDerivation};
pub use error::FixupError;
pub use hooks::HookSet;
pub use pipeline::FixupPipeline;
pub use unit::Fixup;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
