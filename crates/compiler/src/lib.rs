//! Compile execution: turns queued job descriptions into status records and
//! an `output.pdf`.
//!
//! A [`runner::JobRunner`] drives one job through its lifecycle using a
//! [`toolchain::Toolchain`]; a [`worker::QueueWorker`] feeds it from the job
//! store's queue when compiles run out of process.

pub mod error;
pub mod mode;
pub mod runner;
pub mod subprocess;
pub mod toolchain;
pub mod worker;

pub use error::CompileError;
pub use mode::ExecutionMode;
pub use runner::JobRunner;
pub use worker::QueueWorker;
