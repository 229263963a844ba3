//! Default values shared by the protocols and the CLI.

/// Default Spark archive to install.
pub const SPARK_URL: &str =
    "https://downloads.apache.org/spark/spark-3.1.1/spark-3.1.1-bin-hadoop2.7.tgz";

/// Default Java runtime archive for non-privileged installs.
pub const JAVA_URL: &str =
    "https://download.java.net/java/GA/jdk11/9/GPL/openjdk-11.0.2_linux-x64_bin.tar.gz";

/// Minimal acceptable Java major version. 0 means unbounded.
pub const JAVA_MIN: u32 = 11;

/// Maximal acceptable Java major version. 0 means unbounded.
pub const JAVA_MAX: u32 = 0;

/// Download / daemon-start attempts before a step is a terminal failure.
pub const RETRIES: u32 = 5;

/// Seconds slept between remote retry attempts.
pub const RETRY_SLEEP_S: u32 = 5;

/// Port the Spark master listens on.
pub const MASTER_PORT: u16 = 7077;

/// Port for the Spark master web UI.
pub const WEBUI_PORT: u16 = 8080;

/// Installation directory on the remote hosts. The remote home directory is
/// prepended when the path is relative.
pub const INSTALL_DIR: &str = "~/deps";

/// Scratch/log directory for worker daemons.
pub const WORKER_WORKDIR: &str = "~/spark_workdir";

/// Directory on the remote hosts where submitted applications and their
/// data are placed.
pub const APPLICATION_DIR: &str = "~/spark_application";

/// SSH connect timeout in seconds.
pub const CONNECT_TIMEOUT_S: u32 = 10;
