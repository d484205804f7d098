//! Domain types shared by every texsync crate.
//!
//! Holds the revision model, the per-project Revision Registry, compile job
//! descriptions and status records, wire-level constants, and the
//! domain error type.

pub mod error;
pub mod job;
pub mod paths;
pub mod protocol;
pub mod registry;
pub mod revision;
pub mod types;

pub use registry::RevisionRegistry;
pub use revision::Revision;
