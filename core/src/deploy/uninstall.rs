//! Uninstall protocol: remove the installed Spark and Java trees.
//!
//! Plain `rm -rf` per node; no unit is shipped for this. Removing a path
//! that does not exist succeeds, so uninstall is idempotent.

use log::info;

use crate::deploy::{open_pool, ProtocolOutcome};
use crate::error::DeployError;
use crate::infrastructure::runner::CommandRunner;
use crate::locations;
use crate::remote::SshAuth;
use crate::reservation::Reservation;

pub fn uninstall(
    runner: &dyn CommandRunner,
    reservation: &Reservation,
    auth: &SshAuth,
    install_dir: &str,
) -> Result<ProtocolOutcome, DeployError> {
    let anchored = locations::home_anchored(install_dir);
    let spark_dir = locations::spark_dir(&anchored);
    let java_dir = locations::java_dir(&anchored);
    info!(
        "removing {} and {} on {} nodes",
        spark_dir,
        java_dir,
        reservation.len()
    );

    let mut pool = open_pool(runner, reservation.nodes(), auth)?;
    let results = pool.for_each(|session| {
        session.run(&format!("rm -rf {} {}", spark_dir, java_dir))?;
        Ok(())
    });
    pool.close_all();
    Ok(ProtocolOutcome::from_results(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::runner::MockRunner;
    use crate::reservation::Node;

    fn reservation(n: u32) -> Reservation {
        Reservation::new(
            (0..n)
                .map(|i| Node {
                    node_id: i,
                    hostname: format!("node{}", i),
                    ip_public: format!("35.0.0.{}", 10 + i),
                    ip_local: format!("10.0.0.{}", 10 + i),
                    user: "ubuntu".to_string(),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn removes_both_trees_on_every_node() {
        let runner = MockRunner::new().respond("echo ok", Ok("ok\n".into()));
        let outcome = uninstall(&runner, &reservation(3), &SshAuth::default(), "deps").unwrap();
        assert!(outcome.ok);
        assert_eq!(runner.count_matching("rm -rf ~/deps/spark ~/deps/java"), 3);
    }

    #[test]
    fn failing_node_is_collected() {
        let runner = MockRunner::new()
            .respond("echo ok", Ok("ok\n".into()))
            .respond("35.0.0.12 'rm -rf", Err("permission denied".into()));
        let outcome = uninstall(&runner, &reservation(3), &SshAuth::default(), "~/deps").unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.failed_hosts(), vec!["node2"]);
    }
}
