//! Reserved node set — the external collaborator interface.
//!
//! A `Reservation` is handed to every protocol entry point. It is created by
//! an external allocation system; this crate only validates it (non-empty,
//! unique ids) and reads from it. The CLI materialises one from a YAML file.

use serde::{Deserialize, Serialize};

use crate::error::DeployError;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// One remote machine in the reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Numeric identity assigned by the allocation system.
    pub node_id: u32,
    /// Hostname, used for diagnostics only.
    pub hostname: String,
    /// Address reachable from the orchestrator. SSH connects here.
    pub ip_public: String,
    /// Address reachable from the other cluster nodes. Daemons bind here.
    pub ip_local: String,
    /// SSH user on this node.
    pub user: String,
}

impl Node {
    /// The `user@host` string used in SSH/scp/rsync commands.
    pub fn ssh_target(&self) -> String {
        format!("{}@{}", self.user, self.ip_public)
    }
}

// ---------------------------------------------------------------------------
// Reservation
// ---------------------------------------------------------------------------

/// Immutable, ordered, non-empty collection of nodes.
#[derive(Debug, Clone)]
pub struct Reservation {
    nodes: Vec<Node>,
}

/// On-disk shape of a reservation file (`nodes:` list).
#[derive(Debug, Serialize, Deserialize)]
struct ReservationFile {
    nodes: Vec<Node>,
}

impl Reservation {
    /// Validate and wrap a node list. Fails on an empty list or a duplicate
    /// `node_id`.
    pub fn new(nodes: Vec<Node>) -> Result<Self, DeployError> {
        if nodes.is_empty() {
            return Err(DeployError::Validation(
                "reservation does not contain any nodes".into(),
            ));
        }
        for (i, node) in nodes.iter().enumerate() {
            if nodes[..i].iter().any(|n| n.node_id == node.node_id) {
                return Err(DeployError::Validation(format!(
                    "duplicate node_id {} in reservation",
                    node.node_id
                )));
            }
        }
        Ok(Reservation { nodes })
    }

    /// Parse a reservation from its YAML file representation.
    pub fn from_yaml(yaml: &str) -> Result<Self, DeployError> {
        let file: ReservationFile = serde_yaml::from_str(yaml)
            .map_err(|e| DeployError::Validation(format!("bad reservation file: {}", e)))?;
        Reservation::new(file.nodes)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node by its id.
    pub fn get(&self, node_id: u32) -> Option<&Node> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
