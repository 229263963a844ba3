//! Master/worker topology selection.
//!
//! Pure function over a reservation: decides which single node runs the
//! master daemon and which run worker daemons. Never persisted — derived
//! fresh at every start/submit/stop invocation.

use crate::error::DeployError;
use crate::reservation::{Node, Reservation};

/// One elected master plus the remaining nodes as workers.
///
/// Invariants: the master is not in `workers`; `workers` plus the master
/// cover the full reservation.
#[derive(Debug, Clone)]
pub struct Topology {
    pub master: Node,
    pub workers: Vec<Node>,
}

/// Select the topology for a reservation.
///
/// - A single-node reservation makes that node the master with no workers.
/// - With `master_id` set, the matching node is master; an unknown id is a
///   validation error.
/// - Otherwise the node with the lexicographically smallest `ip_public`
///   wins. This is a *string* comparison, kept for compatibility with
///   existing deployments, and it is stable across repeated calls.
pub fn select(reservation: &Reservation, master_id: Option<u32>) -> Result<Topology, DeployError> {
    let nodes = reservation.nodes();
    if nodes.len() == 1 {
        return Ok(Topology {
            master: nodes[0].clone(),
            workers: Vec::new(),
        });
    }

    let master = match master_id {
        Some(id) => reservation
            .get(id)
            .ok_or_else(|| {
                DeployError::Validation(format!("master_id {} not found in reservation", id))
            })?
            .clone(),
        None => nodes
            .iter()
            .min_by(|a, b| a.ip_public.cmp(&b.ip_public))
            .cloned()
            .ok_or_else(|| DeployError::Validation("reservation is empty".into()))?,
    };

    let workers = nodes
        .iter()
        .filter(|n| n.node_id != master.node_id)
        .cloned()
        .collect();
    Ok(Topology { master, workers })
}
