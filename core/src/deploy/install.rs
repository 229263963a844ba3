//! Install protocol: Spark distribution plus a suitable Java runtime on
//! every node.

use log::info;

use crate::defaults;
use crate::deploy::{generation_dir, open_pool, ProtocolOutcome};
use crate::error::DeployError;
use crate::infrastructure::runner::CommandRunner;
use crate::locations;
use crate::payload;
use crate::remote::SshAuth;
use crate::reservation::Reservation;

#[derive(Debug, Clone)]
pub struct InstallConfig {
    pub install_dir: String,
    pub spark_url: String,
    pub java_url: String,
    pub java_min: u32,
    /// 0 means no upper bound.
    pub java_max: u32,
    pub use_sudo: bool,
    pub force_reinstall: bool,
    pub retries: u32,
}

impl Default for InstallConfig {
    fn default() -> Self {
        InstallConfig {
            install_dir: defaults::INSTALL_DIR.to_string(),
            spark_url: defaults::SPARK_URL.to_string(),
            java_url: defaults::JAVA_URL.to_string(),
            java_min: defaults::JAVA_MIN,
            java_max: defaults::JAVA_MAX,
            use_sudo: true,
            force_reinstall: false,
            retries: defaults::RETRIES,
        }
    }
}

/// Install Spark and Java on every node of the reservation, concurrently.
/// Already-installed nodes short-circuit on their install marker unless
/// `force_reinstall` is set.
pub fn install(
    runner: &dyn CommandRunner,
    reservation: &Reservation,
    auth: &SshAuth,
    config: &InstallConfig,
) -> Result<ProtocolOutcome, DeployError> {
    // Package before any remote work so a bad fragment set aborts early.
    let spark_unit = payload::spark_install_unit()?;
    let java_unit = payload::java_install_unit()?;
    let gen_dir = generation_dir();
    let install_dir = locations::home_anchored(&config.install_dir);
    info!(
        "installing spark + java under {} on {} nodes",
        install_dir,
        reservation.len()
    );

    let mut pool = open_pool(runner, reservation.nodes(), auth)?;
    let results = pool.for_each(|session| {
        let spark = session.load_unit(&spark_unit, &gen_dir)?;
        spark.call(
            "install_spark",
            &[
                locations::spark_dir(&install_dir),
                config.spark_url.clone(),
                config.force_reinstall.to_string(),
                config.retries.to_string(),
                defaults::RETRY_SLEEP_S.to_string(),
            ],
        )?;
        let java = session.load_unit(&java_unit, &gen_dir)?;
        java.call(
            "install_java",
            &[
                locations::java_dir(&install_dir),
                config.java_url.clone(),
                config.java_min.to_string(),
                config.java_max.to_string(),
                config.use_sudo.to_string(),
                config.retries.to_string(),
                defaults::RETRY_SLEEP_S.to_string(),
            ],
        )?;
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

    fn ok_probe() -> MockRunner {
        MockRunner::new().respond("echo ok", Ok("ok\n".into()))
    }

    #[test]
    fn installs_both_units_on_every_node() {
        let runner = ok_probe();
        let outcome = install(
            &runner,
            &reservation(3),
            &SshAuth::default(),
            &InstallConfig::default(),
        )
        .unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.nodes.len(), 3);
        assert_eq!(runner.count_matching("spark_install.py install_spark"), 3);
        assert_eq!(runner.count_matching("java_install.py install_java"), 3);
        // Sessions were torn down afterwards.
        assert_eq!(runner.count_matching("-O exit"), 3);
    }

    #[test]
    fn install_arguments_carry_configuration() {
        let runner = ok_probe();
        let config = InstallConfig {
            install_dir: "deps".to_string(),
            force_reinstall: true,
            java_min: 12,
            ..InstallConfig::default()
        };
        install(&runner, &reservation(1), &SshAuth::default(), &config).unwrap();
        let spark_call = runner
            .executed_commands()
            .into_iter()
            .find(|c| c.contains("install_spark"))
            .unwrap();
        // Relative install dir is anchored at the remote home.
        assert!(spark_call.contains("~/deps/spark"));
        assert!(spark_call.contains("true"));
        let java_call = runner
            .executed_commands()
            .into_iter()
            .find(|c| c.contains("install_java"))
            .unwrap();
        assert!(java_call.contains("~/deps/java"));
        assert!(java_call.contains(" \"12\""));
    }

    #[test]
    fn failing_node_is_reported_not_fatal() {
        let runner = ok_probe().respond(
            "35.0.0.11 'python3 ~/.spark_deploy/units/spark_install.py",
            Err("download failed".into()),
        );
        let outcome = install(
            &runner,
            &reservation(3),
            &SshAuth::default(),
            &InstallConfig::default(),
        )
        .unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.failed_hosts(), vec!["node1"]);
        // The two healthy nodes still ran their java step.
        assert_eq!(runner.count_matching("install_java"), 2);
    }

    #[test]
    fn unreachable_cluster_aborts_before_installing() {
        let runner = MockRunner::new().respond("echo ok", Err("timed out".into()));
        let err = install(
            &runner,
            &reservation(2),
            &SshAuth::default(),
            &InstallConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DeployError::Connection { .. }));
        assert_eq!(runner.count_matching("install_spark"), 0);
    }
}
