//! Task protocols: install, start, stop, submit, uninstall.
//!
//! Each protocol is a free function over a reservation. Per-node failures
//! are collected into a `ProtocolOutcome`, never thrown; only
//! whole-operation preconditions (bad input, packaging failure, a failed
//! connect-all) surface as `Err` before any remote work happens.

pub mod install;
pub mod start;
pub mod stop;
pub mod submit;
pub mod uninstall;

use std::path::PathBuf;

use log::warn;
use serde::Serialize;

use crate::error::DeployError;
use crate::infrastructure::runner::CommandRunner;
use crate::remote::{NodeResult, SessionPool, SshAuth};
use crate::reservation::Node;

/// One node's result of a protocol, flattened for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct NodeOutcome {
    pub node_id: u32,
    pub hostname: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Aggregate of a protocol run: the AND of all per-node results.
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolOutcome {
    pub ok: bool,
    pub nodes: Vec<NodeOutcome>,
}

impl ProtocolOutcome {
    pub fn from_results<T>(results: Vec<NodeResult<T>>) -> Self {
        let nodes: Vec<NodeOutcome> = results
            .into_iter()
            .map(|r| NodeOutcome {
                node_id: r.node_id,
                hostname: r.hostname,
                ok: r.result.is_ok(),
                detail: r.result.err().map(|e| e.to_string()),
            })
            .collect();
        ProtocolOutcome {
            ok: nodes.iter().all(|n| n.ok),
            nodes,
        }
    }

    pub fn failed_hosts(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| !n.ok)
            .map(|n| n.hostname.as_str())
            .collect()
    }
}

/// Open a pool over `nodes`, warning when no key path is configured
/// (password prompts will block unattended runs).
pub(crate) fn open_pool<'r>(
    runner: &'r dyn CommandRunner,
    nodes: &[Node],
    auth: &SshAuth,
) -> Result<SessionPool<'r>, DeployError> {
    if auth.key_path.is_none() {
        warn!("no ssh key path configured, expect password prompts");
    }
    SessionPool::open_all(runner, nodes, auth)
}

/// Local scratch directory where units are rendered before shipping.
pub(crate) fn generation_dir() -> PathBuf {
    std::env::temp_dir().join("spark-deploy-generated")
}
