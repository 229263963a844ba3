//! Process-execution infrastructure.
//!
//! The only side-effecting seam in the crate: everything that touches the
//! system (ssh, scp, rsync) goes through the `CommandRunner` trait defined
//! here, so every protocol is testable against `MockRunner`.

pub mod runner;
