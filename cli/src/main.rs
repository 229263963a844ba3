//! spark-deploy — command-line front end for the deployment engine.
//!
//! # Usage
//!
//! ```text
//! spark-deploy --reservation cluster.yml install
//! spark-deploy --reservation cluster.yml start
//! spark-deploy --reservation cluster.yml submit --path target/app.jar \
//!     "--master spark://10.0.0.10:7077 --class org.example.Main app.jar"
//! spark-deploy --reservation cluster.yml stop
//! spark-deploy --reservation cluster.yml uninstall
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;

use spark_deploy_core::defaults;
use spark_deploy_core::deploy::install::{install, InstallConfig};
use spark_deploy_core::deploy::start::{start, StartConfig};
use spark_deploy_core::deploy::stop::{stop, StopConfig};
use spark_deploy_core::deploy::submit::{submit, SubmitConfig};
use spark_deploy_core::deploy::uninstall::uninstall;
use spark_deploy_core::deploy::ProtocolOutcome;
use spark_deploy_core::infrastructure::runner::ShellRunner;
use spark_deploy_core::remote::SshAuth;
use spark_deploy_core::reservation::Reservation;

#[derive(Parser)]
#[command(
    name = "spark-deploy",
    version,
    about = "Deploy and operate a standalone Spark cluster over SSH"
)]
struct Cli {
    /// Reservation file: YAML with a `nodes:` list.
    #[arg(long, global = true, default_value = "reservation.yml")]
    reservation: PathBuf,

    /// Installation directory on the remote hosts.
    #[arg(long, global = true, default_value = defaults::INSTALL_DIR)]
    install_dir: String,

    /// SSH private key used for all connections.
    #[arg(long, global = true)]
    key_path: Option<String>,

    /// Attempts per remote step before it counts as failed.
    #[arg(long, global = true, default_value_t = defaults::RETRIES)]
    retries: u32,

    /// Only log errors.
    #[arg(long, global = true)]
    silent: bool,

    /// Print the outcome as JSON instead of per-node lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Install Spark and a Java runtime on every node.
    Install {
        #[arg(long, default_value = defaults::SPARK_URL)]
        spark_url: String,

        #[arg(long, default_value = defaults::JAVA_URL)]
        java_url: String,

        /// Minimal acceptable Java major version.
        #[arg(long, default_value_t = defaults::JAVA_MIN)]
        java_min: u32,

        /// Maximal acceptable Java major version, 0 for no bound.
        #[arg(long, default_value_t = defaults::JAVA_MAX)]
        java_max: u32,

        /// Never use sudo on the nodes; install Java from an archive
        /// instead of apt when needed.
        #[arg(long)]
        no_sudo: bool,

        /// Reinstall even where an installation already exists.
        #[arg(long)]
        force_reinstall: bool,
    },

    /// Start the master daemon, then all workers against it.
    Start {
        /// Node id to run the master on; default elects the node with the
        /// lowest public address.
        #[arg(long)]
        master_id: Option<u32>,

        #[arg(long, default_value_t = defaults::MASTER_PORT)]
        master_port: u16,

        #[arg(long, default_value_t = defaults::WEBUI_PORT)]
        webui_port: u16,

        /// Scratch directory for the worker daemons.
        #[arg(long, default_value = defaults::WORKER_WORKDIR)]
        workdir: String,
    },

    /// Stop all Spark daemons.
    Stop {
        /// Also remove this worker workdir on every node.
        #[arg(long)]
        remove_workdir: Option<String>,

        #[arg(long)]
        use_sudo: bool,
    },

    /// Ship application files to every node and run spark-submit on the
    /// master.
    Submit {
        /// Everything after the spark-submit executable, quoted as one
        /// argument.
        #[arg(allow_hyphen_values = true)]
        command: String,

        /// Remote directory the application runs from.
        #[arg(long, default_value = defaults::APPLICATION_DIR)]
        application_dir: String,

        /// Local file or directory to ship to every node; repeatable.
        #[arg(long = "path")]
        paths: Vec<PathBuf>,

        #[arg(long)]
        master_id: Option<u32>,
    },

    /// Remove the installed Spark and Java trees from every node.
    Uninstall,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.silent);
    match run(&cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("spark-deploy: {:#}", e);
            process::exit(1);
        }
    }
}

fn init_logging(silent: bool) {
    let level = if silent {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn run(cli: &Cli) -> Result<bool> {
    let yaml = std::fs::read_to_string(&cli.reservation)
        .with_context(|| format!("reading reservation file {}", cli.reservation.display()))?;
    let reservation = Reservation::from_yaml(&yaml)
        .with_context(|| format!("parsing reservation file {}", cli.reservation.display()))?;
    let auth = SshAuth {
        key_path: cli.key_path.clone(),
        connect_timeout_s: defaults::CONNECT_TIMEOUT_S,
    };
    let runner = ShellRunner;

    match &cli.command {
        Command::Install {
            spark_url,
            java_url,
            java_min,
            java_max,
            no_sudo,
            force_reinstall,
        } => {
            let config = InstallConfig {
                install_dir: cli.install_dir.clone(),
                spark_url: spark_url.clone(),
                java_url: java_url.clone(),
                java_min: *java_min,
                java_max: *java_max,
                use_sudo: !no_sudo,
                force_reinstall: *force_reinstall,
                retries: cli.retries,
            };
            let outcome = install(&runner, &reservation, &auth, &config)?;
            Ok(report(&outcome, cli.json))
        }
        Command::Start {
            master_id,
            master_port,
            webui_port,
            workdir,
        } => {
            let config = StartConfig {
                install_dir: cli.install_dir.clone(),
                master_id: *master_id,
                master_port: *master_port,
                webui_port: *webui_port,
                worker_workdir: workdir.clone(),
                retries: cli.retries,
            };
            let result = start(&runner, &reservation, &auth, &config)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("master: {}", result.master_url);
            }
            Ok(report_nodes(&result.outcome, cli.json))
        }
        Command::Stop {
            remove_workdir,
            use_sudo,
        } => {
            let config = StopConfig {
                install_dir: cli.install_dir.clone(),
                remove_workdir: remove_workdir.clone(),
                use_sudo: *use_sudo,
            };
            let outcome = stop(&runner, &reservation, &auth, &config)?;
            Ok(report(&outcome, cli.json))
        }
        Command::Submit {
            command,
            application_dir,
            paths,
            master_id,
        } => {
            let config = SubmitConfig {
                install_dir: cli.install_dir.clone(),
                application_dir: application_dir.clone(),
                paths: paths.clone(),
                command: command.clone(),
                master_id: *master_id,
                retries: cli.retries,
            };
            let outcome = submit(&runner, &reservation, &auth, &config)?;
            Ok(report(&outcome, cli.json))
        }
        Command::Uninstall => {
            let outcome = uninstall(&runner, &reservation, &auth, &cli.install_dir)?;
            Ok(report(&outcome, cli.json))
        }
    }
}

fn report(outcome: &ProtocolOutcome, json: bool) -> bool {
    if json {
        match serde_json::to_string_pretty(outcome) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("spark-deploy: {}", e),
        }
        return outcome.ok;
    }
    report_nodes(outcome, false)
}

fn report_nodes(outcome: &ProtocolOutcome, json: bool) -> bool {
    if !json {
        for node in &outcome.nodes {
            match &node.detail {
                Some(detail) if !node.ok => {
                    println!("  {} FAILED: {}", node.hostname, detail)
                }
                _ => println!("  {} ok", node.hostname),
            }
        }
        if !outcome.ok {
            eprintln!("failed on: {}", outcome.failed_hosts().join(", "));
        }
    }
    outcome.ok
}
