//! SSH transport: per-node sessions, the pooled fan-out over a
//! reservation, and rsync file shipping.

pub mod pool;
pub mod session;
pub mod sync;

pub use pool::{NodeResult, SessionPool};
pub use session::{RemoteSession, RemoteUnit, SshAuth};
