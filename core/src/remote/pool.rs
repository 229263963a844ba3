//! Pooled sessions over a whole reservation.
//!
//! Protocols never touch individual sockets: they open a pool over the
//! nodes they need, fan work out with one thread per node, and close the
//! pool when done. Opening is all-or-nothing; a deployment where only some
//! nodes are reachable is not worth starting.

use std::thread;

use log::{debug, info};

use crate::error::DeployError;
use crate::infrastructure::runner::CommandRunner;
use crate::remote::session::{RemoteSession, SshAuth};
use crate::reservation::Node;

/// Outcome of one node's step in a fan-out.
#[derive(Debug)]
pub struct NodeResult<T> {
    pub node_id: u32,
    pub hostname: String,
    pub result: Result<T, DeployError>,
}

impl<T> NodeResult<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct SessionPool<'r> {
    sessions: Vec<RemoteSession<'r>>,
}

impl std::fmt::Debug for SessionPool<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

impl<'r> SessionPool<'r> {
    /// Open a session to every node, concurrently. If any node fails, the
    /// already-open sessions are closed and the error names every
    /// unreachable host.
    pub fn open_all(
        runner: &'r dyn CommandRunner,
        nodes: &[Node],
        auth: &SshAuth,
    ) -> Result<SessionPool<'r>, DeployError> {
        info!("opening ssh sessions to {} nodes", nodes.len());
        let results: Vec<Result<RemoteSession<'r>, (String, DeployError)>> =
            thread::scope(|scope| {
                let handles: Vec<_> = nodes
                    .iter()
                    .map(|node| {
                        let node = node.clone();
                        scope.spawn(move || {
                            let mut session = RemoteSession::new(runner, node, auth);
                            match session.open() {
                                Ok(()) => Ok(session),
                                Err(e) => Err((session.hostname().to_string(), e)),
                            }
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

        let mut sessions = Vec::with_capacity(nodes.len());
        let mut failed: Vec<String> = Vec::new();
        for result in results {
            match result {
                Ok(session) => sessions.push(session),
                Err((host, e)) => {
                    debug!("session to {} failed: {}", host, e);
                    failed.push(host);
                }
            }
        }
        if !failed.is_empty() {
            for session in &mut sessions {
                session.close();
            }
            failed.sort();
            return Err(DeployError::connection(
                failed.join(", "),
                "could not open ssh session",
            ));
        }
        Ok(SessionPool { sessions })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn session(&self, node_id: u32) -> Option<&RemoteSession<'r>> {
        self.sessions.iter().find(|s| s.node().node_id == node_id)
    }

    /// Run `op` against every session, one thread per node. Results come
    /// back in the pool's node order regardless of completion order.
    pub fn for_each<T, F>(&self, op: F) -> Vec<NodeResult<T>>
    where
        T: Send,
        F: Fn(&RemoteSession<'r>) -> Result<T, DeployError> + Sync,
    {
        self.fan_out(self.sessions.iter().collect(), &op)
    }

    /// Like `for_each`, restricted to the sessions whose node ids are in
    /// `node_ids`.
    pub fn for_each_node<T, F>(&self, node_ids: &[u32], op: F) -> Vec<NodeResult<T>>
    where
        T: Send,
        F: Fn(&RemoteSession<'r>) -> Result<T, DeployError> + Sync,
    {
        let subset = self
            .sessions
            .iter()
            .filter(|s| node_ids.contains(&s.node().node_id))
            .collect();
        self.fan_out(subset, &op)
    }

    fn fan_out<T, F>(&self, sessions: Vec<&RemoteSession<'r>>, op: &F) -> Vec<NodeResult<T>>
    where
        T: Send,
        F: Fn(&RemoteSession<'r>) -> Result<T, DeployError> + Sync,
    {
        thread::scope(|scope| {
            let handles: Vec<_> = sessions
                .into_iter()
                .map(|session| {
                    scope.spawn(move || NodeResult {
                        node_id: session.node().node_id,
                        hostname: session.hostname().to_string(),
                        result: op(session),
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    /// Close every session. Close failures are ignored.
    pub fn close_all(&mut self) {
        for session in &mut self.sessions {
            session.close();
        }
    }
}
