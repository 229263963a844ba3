//! Embedded remote-procedure fragments and the unit composition each
//! protocol ships.
//!
//! The fragment sources live under `core/payload/` and are compiled into
//! the binary, so the orchestrator has no runtime file dependencies of its
//! own. Every composition ends with the dispatcher fragment, which must be
//! last so its `__main__` block runs after all definitions are in scope.

use crate::error::DeployError;
use crate::unit::{ExecutableUnit, Fragment, UnitPackager};

const PRINTER: &str = include_str!("../payload/printer.py");
const ENVSTORE: &str = include_str!("../payload/envstore.py");
const SPARK_INSTALL: &str = include_str!("../payload/spark_install.py");
const JAVA_INSTALL: &str = include_str!("../payload/java_install.py");
const SPARK_START: &str = include_str!("../payload/spark_start.py");
const SPARK_STOP: &str = include_str!("../payload/spark_stop.py");
const SPARK_SUBMIT: &str = include_str!("../payload/spark_submit.py");
const BASE: &str = include_str!("../payload/base.py");

pub fn spark_install_unit() -> Result<ExecutableUnit, DeployError> {
    UnitPackager::package(
        "spark_install",
        &[
            Fragment::new("printer", PRINTER),
            Fragment::new("spark_install", SPARK_INSTALL),
            Fragment::new("base", BASE),
        ],
    )
}

pub fn java_install_unit() -> Result<ExecutableUnit, DeployError> {
    UnitPackager::package(
        "java_install",
        &[
            Fragment::new("printer", PRINTER),
            Fragment::new("envstore", ENVSTORE),
            Fragment::new("java_install", JAVA_INSTALL),
            Fragment::new("base", BASE),
        ],
    )
}

pub fn spark_start_unit() -> Result<ExecutableUnit, DeployError> {
    UnitPackager::package(
        "spark_start",
        &[
            Fragment::new("printer", PRINTER),
            Fragment::new("envstore", ENVSTORE),
            Fragment::new("spark_start", SPARK_START),
            Fragment::new("base", BASE),
        ],
    )
}

pub fn spark_stop_unit() -> Result<ExecutableUnit, DeployError> {
    UnitPackager::package(
        "spark_stop",
        &[
            Fragment::new("printer", PRINTER),
            Fragment::new("spark_stop", SPARK_STOP),
            Fragment::new("base", BASE),
        ],
    )
}

pub fn spark_submit_unit() -> Result<ExecutableUnit, DeployError> {
    UnitPackager::package(
        "spark_submit",
        &[
            Fragment::new("printer", PRINTER),
            Fragment::new("envstore", ENVSTORE),
            Fragment::new("spark_submit", SPARK_SUBMIT),
            Fragment::new("base", BASE),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_units_package_cleanly() {
        for unit in [
            spark_install_unit().unwrap(),
            java_install_unit().unwrap(),
            spark_start_unit().unwrap(),
            spark_stop_unit().unwrap(),
            spark_submit_unit().unwrap(),
        ] {
            // Dispatcher last, so the __main__ block sees every definition.
            assert_eq!(unit.manifest().last().unwrap(), "base");
            assert!(unit.source().contains("def main():"));
        }
    }

    #[test]
    fn install_unit_exposes_entry_points() {
        let unit = spark_install_unit().unwrap();
        assert!(unit.source().contains("def install_spark("));
        assert!(unit.source().contains("def spark_installed("));
    }

    #[test]
    fn java_unit_carries_env_store() {
        let unit = java_install_unit().unwrap();
        assert!(unit.source().contains("class EnvStore"));
        assert!(unit.source().contains("def install_java("));
    }

    #[test]
    fn start_unit_exposes_both_daemon_starters() {
        let unit = spark_start_unit().unwrap();
        assert!(unit.source().contains("def start_master("));
        assert!(unit.source().contains("def start_worker("));
    }

    #[test]
    fn stop_and_submit_units_expose_entries() {
        assert!(spark_stop_unit().unwrap().source().contains("def stop_all("));
        assert!(spark_submit_unit()
            .unwrap()
            .source()
            .contains("def submit_app("));
    }

    // The tests below run the packaged units under a real python3 against
    // stub install trees, pinning the remote-side contracts that the mock
    // runner cannot reach.

    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::process::{Command, Output};
    use std::time::{Duration, Instant};

    fn scratch_home(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "spark-deploy-payload-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_script(path: &Path, body: &str) {
        fs::write(path, body).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn run_unit(
        unit: &ExecutableUnit,
        home: &Path,
        envs: &[(&str, String)],
        entry: &str,
        args: &[&str],
    ) -> Output {
        let path = unit.write_to(&home.join("gen")).unwrap();
        let mut cmd = Command::new("python3");
        cmd.arg(&path).arg(entry).args(args).env("HOME", home);
        for (key, value) in envs {
            cmd.env(key, value);
        }
        cmd.output().unwrap()
    }

    fn stderr_of(out: &Output) -> String {
        String::from_utf8_lossy(&out.stderr).to_string()
    }

    #[test]
    fn stop_on_stopped_node_succeeds() {
        let home = scratch_home("stop");
        let spark = home.join("deps/spark");
        let sbin = spark.join("sbin");
        fs::create_dir_all(&sbin).unwrap();
        write_script(
            &sbin.join("stop-worker.sh"),
            "#!/bin/sh\necho 'no org.apache.spark.deploy.worker.Worker to stop'\nexit 1\n",
        );
        write_script(
            &sbin.join("stop-master.sh"),
            "#!/bin/sh\necho 'no org.apache.spark.deploy.master.Master to stop'\nexit 1\n",
        );
        let out = run_unit(
            &spark_stop_unit().unwrap(),
            &home,
            &[],
            "stop_all",
            &[spark.to_str().unwrap(), "null", "false"],
        );
        assert!(out.status.success(), "{}", stderr_of(&out));
    }

    #[test]
    fn install_marker_short_circuits_reinstall() {
        let home = scratch_home("install");
        let spark = home.join("deps/spark");
        fs::create_dir_all(spark.join("sbin")).unwrap();
        // Unreachable url: success can only come from the marker check.
        let url = "http://127.0.0.1:1/spark.tgz";
        let args = [spark.to_str().unwrap(), url, "false", "1", "0"];
        let out = run_unit(&spark_install_unit().unwrap(), &home, &[], "install_spark", &args);
        assert!(out.status.success(), "{}", stderr_of(&out));
        assert!(stderr_of(&out).contains("already installed"));

        // Forcing past the marker must actually try (and fail) the download.
        let forced = [spark.to_str().unwrap(), url, "true", "1", "0"];
        let out = run_unit(&spark_install_unit().unwrap(), &home, &[], "install_spark", &forced);
        assert!(!out.status.success());
        assert!(stderr_of(&out).contains("could not download"));
    }

    #[test]
    fn master_start_self_heals_over_stale_daemon() {
        let home = scratch_home("master");
        let spark = home.join("deps/spark");
        let sbin = spark.join("sbin");
        fs::create_dir_all(&sbin).unwrap();
        // Mimics the daemon scripts: refuses while the pid marker exists,
        // succeeds after stop-master.sh removed it.
        write_script(
            &sbin.join("start-master.sh"),
            "#!/bin/sh\ndir=\"$(dirname \"$0\")\"\n\
             if [ -f \"$dir/running\" ]; then\n\
               echo 'master already running as process 123.  Stop it first.'\n\
               exit 1\n\
             fi\necho 'starting org.apache.spark.deploy.master.Master'\nexit 0\n",
        );
        write_script(
            &sbin.join("stop-master.sh"),
            "#!/bin/sh\nrm -f \"$(dirname \"$0\")/running\"\nexit 0\n",
        );
        fs::write(sbin.join("running"), "123").unwrap();

        let out = run_unit(
            &spark_start_unit().unwrap(),
            &home,
            &[("JAVA_HOME", "/usr".to_string())],
            "start_master",
            &[spark.to_str().unwrap(), "10.0.0.1", "7077", "8080", "2", "0"],
        );
        assert!(out.status.success(), "{}", stderr_of(&out));
        assert!(stderr_of(&out).contains("already running"));
        assert!(!sbin.join("running").exists());
    }

    #[test]
    fn master_start_requires_runtime_env() {
        let home = scratch_home("master-env");
        let spark = home.join("deps/spark");
        fs::create_dir_all(spark.join("sbin")).unwrap();
        write_script(
            &spark.join("sbin/start-master.sh"),
            "#!/bin/sh\nexit 0\n",
        );
        let out = run_unit(
            &spark_start_unit().unwrap(),
            &home,
            &[],
            "start_master",
            &[spark.to_str().unwrap(), "10.0.0.1", "7077", "8080", "1", "0"],
        );
        assert!(!out.status.success());
        assert!(stderr_of(&out).contains("JAVA_HOME"));
    }

    #[test]
    fn worker_start_needs_exactly_one_starting_line() {
        let home = scratch_home("worker");
        let spark = home.join("deps/spark");
        let sbin = spark.join("sbin");
        fs::create_dir_all(&sbin).unwrap();
        let workdir = home.join("wd");
        let java = [("JAVA_HOME", "/usr".to_string())];
        let args = [
            spark.to_str().unwrap(),
            "spark://10.0.0.1:7077",
            workdir.to_str().unwrap(),
            "1",
            "60",
        ];

        write_script(
            &sbin.join("start-worker.sh"),
            "#!/bin/sh\necho 'starting org.apache.spark.deploy.worker.Worker'\nexit 0\n",
        );
        let out = run_unit(&spark_start_unit().unwrap(), &home, &java, "start_worker", &args);
        assert!(out.status.success(), "{}", stderr_of(&out));

        // Two 'starting' lines fail even on exit 0; and the terminal
        // failure returns without serving the retry sleep.
        write_script(
            &sbin.join("start-worker.sh"),
            "#!/bin/sh\necho 'starting worker one'\necho 'starting worker two'\nexit 0\n",
        );
        let began = Instant::now();
        let out = run_unit(&spark_start_unit().unwrap(), &home, &java, "start_worker", &args);
        assert!(!out.status.success());
        assert!(began.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn java_pinned_from_declared_home() {
        let home = scratch_home("java");
        let jdk = home.join("jdk");
        fs::create_dir_all(jdk.join("bin")).unwrap();
        write_script(
            &jdk.join("bin/java"),
            "#!/bin/sh\necho 'openjdk version \"11.0.2\" 2019-01-15' >&2\nexit 0\n",
        );
        let out = run_unit(
            &java_install_unit().unwrap(),
            &home,
            &[("JAVA_HOME", jdk.to_str().unwrap().to_string())],
            "install_java",
            &[
                home.join("deps/java").to_str().unwrap(),
                "http://127.0.0.1:1/jdk.tgz",
                "11",
                "0",
                "false",
                "1",
                "0",
            ],
        );
        assert!(out.status.success(), "{}", stderr_of(&out));
        let store = fs::read_to_string(home.join(".spark_deploy/env.cfg")).unwrap();
        assert!(store.contains("java_home"));
        assert!(store.contains(jdk.to_str().unwrap()));
    }

    #[test]
    fn java_version_bounds_classification() {
        let home = scratch_home("bounds");
        let unit = java_install_unit().unwrap();
        let ok = run_unit(&unit, &home, &[], "version_in_bounds", &["11", "11", "0"]);
        assert!(ok.status.success());
        let below = run_unit(&unit, &home, &[], "version_in_bounds", &["8", "11", "0"]);
        assert!(!below.status.success());
        let above = run_unit(&unit, &home, &[], "version_in_bounds", &["16", "11", "15"]);
        assert!(!above.status.success());
    }
}
