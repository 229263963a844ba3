//! Stop protocol: bring daemons down on every node.

use log::info;

use crate::defaults;
use crate::deploy::{generation_dir, open_pool, ProtocolOutcome};
use crate::error::DeployError;
use crate::infrastructure::runner::CommandRunner;
use crate::locations;
use crate::payload;
use crate::remote::{SessionPool, SshAuth};
use crate::reservation::Reservation;

#[derive(Debug, Clone)]
pub struct StopConfig {
    pub install_dir: String,
    /// When set, the worker workdir is removed after the daemons stop.
    pub remove_workdir: Option<String>,
    pub use_sudo: bool,
}

impl Default for StopConfig {
    fn default() -> Self {
        StopConfig {
            install_dir: defaults::INSTALL_DIR.to_string(),
            remove_workdir: None,
            use_sudo: false,
        }
    }
}

/// Stop worker and master daemons on every node, concurrently. Nodes with
/// no running daemon count as stopped.
pub fn stop(
    runner: &dyn CommandRunner,
    reservation: &Reservation,
    auth: &SshAuth,
    config: &StopConfig,
) -> Result<ProtocolOutcome, DeployError> {
    let mut pool = open_pool(runner, reservation.nodes(), auth)?;
    let outcome = stop_with_pool(&pool, config);
    pool.close_all();
    outcome
}

/// `stop` over caller-owned sessions; the pool stays open afterwards.
pub fn stop_with_pool(
    pool: &SessionPool,
    config: &StopConfig,
) -> Result<ProtocolOutcome, DeployError> {
    let unit = payload::spark_stop_unit()?;
    let gen_dir = generation_dir();
    let spark_dir = locations::spark_dir(&locations::home_anchored(&config.install_dir));
    // JSON null keeps the workdir in place.
    let workdir_arg = config
        .remove_workdir
        .clone()
        .unwrap_or_else(|| "null".to_string());
    info!("stopping spark daemons on {} nodes", pool.len());

    let results = pool.for_each(|session| {
        let u = session.load_unit(&unit, &gen_dir)?;
        u.call(
            "stop_all",
            &[
                spark_dir.clone(),
                workdir_arg.clone(),
                config.use_sudo.to_string(),
            ],
        )?;
        Ok(())
    });
    Ok(ProtocolOutcome::from_results(results))
}
