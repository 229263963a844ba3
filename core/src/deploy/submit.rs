//! Submit protocol: ship application files to the cluster and run
//! spark-submit on the master.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use log::info;

use crate::defaults;
use crate::deploy::{generation_dir, open_pool, ProtocolOutcome};
use crate::error::DeployError;
use crate::infrastructure::runner::CommandRunner;
use crate::locations;
use crate::payload;
use crate::remote::{sync, RemoteSession, SessionPool, SshAuth};
use crate::reservation::{Node, Reservation};
use crate::retry::RetryPolicy;
use crate::topology;

#[derive(Debug, Clone)]
pub struct SubmitConfig {
    pub install_dir: String,
    /// Remote directory the application runs from, relative to the remote
    /// home unless absolute.
    pub application_dir: String,
    /// Local files and directories to ship to every node before running.
    pub paths: Vec<PathBuf>,
    /// Everything after the spark-submit executable, e.g. as produced by
    /// `SubmitCommandBuilder`.
    pub command: String,
    pub master_id: Option<u32>,
    pub retries: u32,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        SubmitConfig {
            install_dir: defaults::INSTALL_DIR.to_string(),
            application_dir: defaults::APPLICATION_DIR.to_string(),
            paths: Vec::new(),
            command: String::new(),
            master_id: None,
            retries: defaults::RETRIES,
        }
    }
}

/// Ship the application to every node and submit it on the master.
///
/// Files go to all nodes, not just the master: in cluster deploy mode the
/// driver may be scheduled anywhere.
pub fn submit(
    runner: &dyn CommandRunner,
    reservation: &Reservation,
    auth: &SshAuth,
    config: &SubmitConfig,
) -> Result<ProtocolOutcome, DeployError> {
    let topo = topology::select(reservation, config.master_id)?;
    let mut pool = open_pool(runner, reservation.nodes(), auth)?;
    let outcome = submit_with_pool(&pool, &topo.master, config);
    pool.close_all();
    outcome
}

/// `submit` over caller-owned sessions; the pool stays open afterwards.
pub fn submit_with_pool(
    pool: &SessionPool,
    master: &Node,
    config: &SubmitConfig,
) -> Result<ProtocolOutcome, DeployError> {
    let app_dir = normalize_application_dir(&config.application_dir)?;
    let missing: Vec<String> = config
        .paths
        .iter()
        .filter(|p| fs::metadata(p).is_err())
        .map(|p| p.display().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DeployError::Validation(format!(
            "paths do not exist locally: {}",
            missing.join(", ")
        )));
    }

    let exec = locations::spark_submit_exec(&locations::home_anchored(&config.install_dir));
    let master_session = pool
        .session(master.node_id)
        .ok_or_else(|| DeployError::Validation("master session missing from pool".into()))?;
    if master_session.run(&format!("test -f {}", exec)).is_err() {
        return Err(DeployError::Validation(format!(
            "spark-submit not found at {} on {}",
            exec, master.hostname
        )));
    }

    info!(
        "shipping {} paths to {} nodes, submitting on {}",
        config.paths.len(),
        pool.len(),
        master.hostname
    );
    let retry = RetryPolicy::new(
        config.retries,
        Duration::from_secs(defaults::RETRY_SLEEP_S as u64),
    );
    let ship_results = pool.for_each(|session| {
        session.run(&format!("mkdir -p {}", app_dir))?;
        for path in &config.paths {
            retry.run("file transfer", |_| ship_path(session, path, &app_dir))?;
        }
        Ok(())
    });

    let mut outcome = ProtocolOutcome::from_results(ship_results);
    if !outcome.ok {
        return Ok(outcome);
    }

    let run_cmd = format!("{} {}", exec, config.command.trim());
    let unit = payload::spark_submit_unit()?;
    let submitted = master_session
        .load_unit(&unit, &generation_dir())
        .and_then(|u| u.call("submit_app", &[run_cmd, app_dir]));
    if let Err(e) = submitted {
        outcome.ok = false;
        for node in &mut outcome.nodes {
            if node.node_id == master.node_id {
                node.ok = false;
                node.detail = Some(e.to_string());
            }
        }
    }
    Ok(outcome)
}

fn ship_path(session: &RemoteSession, path: &PathBuf, app_dir: &str) -> Result<(), DeployError> {
    let meta = fs::metadata(path).map_err(|e| DeployError::io(path, e))?;
    if meta.is_dir() {
        sync::upload_dir(session, path, app_dir, false)
    } else {
        session.upload(path, app_dir)
    }
}

/// Reject directories that would make `rm`/`rsync` dangerous or ambiguous
/// and anchor relative ones at the remote home.
fn normalize_application_dir(dir: &str) -> Result<String, DeployError> {
    let trimmed = dir.trim();
    let stripped = trimmed.strip_prefix("~/").unwrap_or(trimmed);
    if stripped.is_empty() || stripped == "~" {
        return Err(DeployError::Validation(format!(
            "illegal application dir '{}'",
            dir
        )));
    }
    if stripped.starts_with('/') {
        Ok(stripped.to_string())
    } else {
        Ok(format!("~/{}", stripped))
    }
}

// ---------------------------------------------------------------------------
// Command building
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    Java,
    Python,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    Client,
    Cluster,
}

impl DeployMode {
    fn as_str(&self) -> &'static str {
        match self {
            DeployMode::Client => "client",
            DeployMode::Cluster => "cluster",
        }
    }
}

/// Builds the argument string for a spark-submit invocation. Pure string
/// assembly; all validation happens in `build`.
#[derive(Debug, Clone)]
pub struct SubmitCommandBuilder {
    job_type: JobType,
    deploy_mode: DeployMode,
    master_url: Option<String>,
    application: Option<String>,
    class_name: Option<String>,
    driver_memory: Option<String>,
    executor_memory: Option<String>,
    java_options: Vec<String>,
    conf_options: Vec<String>,
    jars: Vec<String>,
    args: Vec<String>,
}

impl SubmitCommandBuilder {
    pub fn new(job_type: JobType) -> Self {
        SubmitCommandBuilder {
            job_type,
            deploy_mode: DeployMode::Client,
            master_url: None,
            application: None,
            class_name: None,
            driver_memory: None,
            executor_memory: None,
            java_options: Vec::new(),
            conf_options: Vec::new(),
            jars: Vec::new(),
            args: Vec::new(),
        }
    }

    pub fn deploy_mode(mut self, mode: DeployMode) -> Self {
        self.deploy_mode = mode;
        self
    }

    pub fn master_url(mut self, url: impl Into<String>) -> Self {
        self.master_url = Some(url.into());
        self
    }

    pub fn application(mut self, path: impl Into<String>) -> Self {
        self.application = Some(path.into());
        self
    }

    pub fn class_name(mut self, class: impl Into<String>) -> Self {
        self.class_name = Some(class.into());
        self
    }

    pub fn driver_memory(mut self, mem: impl Into<String>) -> Self {
        self.driver_memory = Some(mem.into());
        self
    }

    pub fn executor_memory(mut self, mem: impl Into<String>) -> Self {
        self.executor_memory = Some(mem.into());
        self
    }

    pub fn java_option(mut self, opt: impl Into<String>) -> Self {
        self.java_options.push(opt.into());
        self
    }

    pub fn conf_option(mut self, opt: impl Into<String>) -> Self {
        self.conf_options.push(opt.into());
        self
    }

    pub fn jar(mut self, jar: impl Into<String>) -> Self {
        self.jars.push(jar.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn build(&self) -> Result<String, DeployError> {
        let master = self
            .master_url
            .as_deref()
            .ok_or_else(|| DeployError::Validation("no master url set".into()))?;
        let application = self
            .application
            .as_deref()
            .ok_or_else(|| DeployError::Validation("no application set".into()))?;
        if self.job_type == JobType::Java && self.class_name.is_none() {
            return Err(DeployError::Validation(
                "java jobs need a main class".into(),
            ));
        }
        if self.job_type == JobType::Python && self.deploy_mode == DeployMode::Cluster {
            // Standalone clusters cannot run a python driver remotely.
            return Err(DeployError::Validation(
                "python jobs cannot use cluster deploy mode".into(),
            ));
        }
        for mem in [&self.driver_memory, &self.executor_memory].into_iter().flatten() {
            if !valid_byte_size(mem) {
                return Err(DeployError::Validation(format!(
                    "illegal memory size '{}', expected digits plus k/b/m/g/t",
                    mem
                )));
            }
        }

        let mut cmd = format!("--master {}", master);
        cmd.push_str(&format!(" --deploy-mode {}", self.deploy_mode.as_str()));
        if let Some(class) = &self.class_name {
            cmd.push_str(&format!(" --class {}", class));
        }
        if let Some(mem) = &self.driver_memory {
            cmd.push_str(&format!(" --driver-memory {}", mem));
        }
        if let Some(mem) = &self.executor_memory {
            cmd.push_str(&format!(" --executor-memory {}", mem));
        }
        if !self.java_options.is_empty() {
            cmd.push_str(&format!(
                " --driver-java-options \"{}\"",
                self.java_options.join(" ")
            ));
        }
        for conf in &self.conf_options {
            cmd.push_str(&format!(" --conf {}", conf));
        }
        if !self.jars.is_empty() {
            cmd.push_str(&format!(" --jars {}", self.jars.join(",")));
        }
        cmd.push(' ');
        cmd.push_str(application);
        for arg in &self.args {
            cmd.push(' ');
            cmd.push_str(arg);
        }
        Ok(cmd)
    }
}

/// `[0-9]+[kbmgt]`, case-insensitive.
fn valid_byte_size(s: &str) -> bool {
    let Some(last) = s.chars().last() else {
        return false;
    };
    if !"kbmgtKBMGT".contains(last) {
        return false;
    }
    let digits = &s[..s.len() - 1];
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
