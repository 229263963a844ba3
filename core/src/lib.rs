//! Spark cluster deployment engine.
//!
//! Orchestrates installation, startup, job submission, and teardown of a
//! standalone Spark cluster over plain SSH. The reservation of machines
//! comes from an external allocator; this crate only consumes it.
//!
//! Layout:
//! - `reservation` / `topology` — the node set and master election.
//! - `remote` — multiplexed SSH sessions, the pooled fan-out, rsync.
//! - `unit` / `payload` — packaging of the source units shipped to nodes.
//! - `deploy` — the install / start / stop / submit / uninstall protocols.
//! - `infrastructure` — the command-runner seam everything executes through.

pub mod defaults;
pub mod deploy;
pub mod error;
pub mod infrastructure;
pub mod locations;
pub mod payload;
pub mod remote;
pub mod reservation;
pub mod retry;
pub mod topology;
pub mod unit;

pub use error::DeployError;
