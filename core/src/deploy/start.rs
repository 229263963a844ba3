//! Start protocol: master daemon first, then all workers against it.

use log::info;
use serde::Serialize;

use crate::defaults;
use crate::deploy::{generation_dir, open_pool, NodeOutcome, ProtocolOutcome};
use crate::error::DeployError;
use crate::infrastructure::runner::CommandRunner;
use crate::locations;
use crate::payload;
use crate::remote::SshAuth;
use crate::reservation::Reservation;
use crate::topology;

#[derive(Debug, Clone)]
pub struct StartConfig {
    pub install_dir: String,
    /// Explicit master node; unset lets the topology selector elect one.
    pub master_id: Option<u32>,
    pub master_port: u16,
    pub webui_port: u16,
    pub worker_workdir: String,
    pub retries: u32,
}

impl Default for StartConfig {
    fn default() -> Self {
        StartConfig {
            install_dir: defaults::INSTALL_DIR.to_string(),
            master_id: None,
            master_port: defaults::MASTER_PORT,
            webui_port: defaults::WEBUI_PORT,
            worker_workdir: defaults::WORKER_WORKDIR.to_string(),
            retries: defaults::RETRIES,
        }
    }
}

/// Result of a start run: the per-node outcome plus the resolved master.
/// `master_url` is what workers connected to and what submit needs.
#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    #[serde(flatten)]
    pub outcome: ProtocolOutcome,
    pub master_id: u32,
    pub master_url: String,
}

/// Start the cluster daemons. The master must be up before any worker is
/// attempted; a failed master start fails the whole protocol with workers
/// reported as skipped.
pub fn start(
    runner: &dyn CommandRunner,
    reservation: &Reservation,
    auth: &SshAuth,
    config: &StartConfig,
) -> Result<StartOutcome, DeployError> {
    let topo = topology::select(reservation, config.master_id)?;
    let master_url = format!("spark://{}:{}", topo.master.ip_local, config.master_port);
    let unit = payload::spark_start_unit()?;
    let gen_dir = generation_dir();
    let install_dir = locations::home_anchored(&config.install_dir);
    let spark_dir = locations::spark_dir(&install_dir);
    info!(
        "starting cluster: master {} ({}), {} workers",
        topo.master.hostname,
        master_url,
        topo.workers.len()
    );

    let mut pool = open_pool(runner, reservation.nodes(), auth)?;
    let master_session = pool
        .session(topo.master.node_id)
        .ok_or_else(|| DeployError::Validation("master session missing from pool".into()))?;
    let master_result = master_session
        .load_unit(&unit, &gen_dir)
        .and_then(|u| {
            u.call(
                "start_master",
                &[
                    spark_dir.clone(),
                    topo.master.ip_local.clone(),
                    config.master_port.to_string(),
                    config.webui_port.to_string(),
                    config.retries.to_string(),
                    defaults::RETRY_SLEEP_S.to_string(),
                ],
            )
        })
        .map(|_| ());

    let mut nodes = vec![NodeOutcome {
        node_id: topo.master.node_id,
        hostname: topo.master.hostname.clone(),
        ok: master_result.is_ok(),
        detail: master_result.as_ref().err().map(|e| e.to_string()),
    }];

    if master_result.is_ok() {
        let worker_ids: Vec<u32> = topo.workers.iter().map(|w| w.node_id).collect();
        let worker_results = pool.for_each_node(&worker_ids, |session| {
            let u = session.load_unit(&unit, &gen_dir)?;
            u.call(
                "start_worker",
                &[
                    spark_dir.clone(),
                    master_url.clone(),
                    config.worker_workdir.clone(),
                    config.retries.to_string(),
                    defaults::RETRY_SLEEP_S.to_string(),
                ],
            )?;
            Ok(())
        });
        nodes.extend(ProtocolOutcome::from_results(worker_results).nodes);
    } else {
        for worker in &topo.workers {
            nodes.push(NodeOutcome {
                node_id: worker.node_id,
                hostname: worker.hostname.clone(),
                ok: false,
                detail: Some("skipped, master did not start".to_string()),
            });
        }
    }
    pool.close_all();

    let ok = nodes.iter().all(|n| n.ok);
    Ok(StartOutcome {
        outcome: ProtocolOutcome { ok, nodes },
        master_id: topo.master.node_id,
        master_url,
    })
}
