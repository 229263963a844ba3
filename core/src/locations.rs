//! Remote filesystem layout contract.
//!
//! Install, start, stop, and submit must agree on where things live on the
//! remote hosts; every path is derived here. Paths are plain `/`-joined
//! strings because they describe the *remote* (always POSIX) filesystem,
//! not the local one.

/// Path to the Spark installation under `install_dir`.
pub fn spark_dir(install_dir: &str) -> String {
    join(install_dir, "spark")
}

/// Path to a non-privileged Java installation under `install_dir`.
/// Does not exist when an acceptable system Java was detected instead.
pub fn java_dir(install_dir: &str) -> String {
    join(install_dir, "java")
}

/// The spark-submit executable inside a Spark installation.
pub fn spark_submit_exec(install_dir: &str) -> String {
    join(&join(&spark_dir(install_dir), "bin"), "spark-submit")
}

/// Staging directory on the remote host where generated units are shipped.
pub const UNIT_STAGING_DIR: &str = "~/.spark_deploy/units";

/// Remote path of a shipped unit.
pub fn staged_unit(unit_name: &str) -> String {
    format!("{}/{}.py", UNIT_STAGING_DIR, unit_name)
}

/// Prepend `~/` to a relative remote path so commands work from any cwd.
pub fn home_anchored(path: &str) -> String {
    if path.starts_with('/') || path.starts_with('~') {
        path.to_string()
    } else {
        format!("~/{}", path)
    }
}

fn join(base: &str, leaf: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, leaf)
    } else {
        format!("{}/{}", base, leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spark_dir_joined() {
        assert_eq!(spark_dir("~/deps"), "~/deps/spark");
        assert_eq!(spark_dir("/opt/deps/"), "/opt/deps/spark");
    }

    #[test]
    fn java_dir_joined() {
        assert_eq!(java_dir("~/deps"), "~/deps/java");
    }

    #[test]
    fn spark_submit_under_bin() {
        assert_eq!(spark_submit_exec("~/deps"), "~/deps/spark/bin/spark-submit");
    }

    #[test]
    fn staged_unit_path() {
        assert_eq!(
            staged_unit("install_spark"),
            "~/.spark_deploy/units/install_spark.py"
        );
    }

    #[test]
    fn home_anchored_leaves_absolute_alone() {
        assert_eq!(home_anchored("/opt/deps"), "/opt/deps");
        assert_eq!(home_anchored("~/deps"), "~/deps");
        assert_eq!(home_anchored("deps"), "~/deps");
    }
}
