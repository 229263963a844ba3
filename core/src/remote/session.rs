//! One multiplexed SSH session to a single node.
//!
//! A session opens a ControlMaster background connection once, then every
//! command, upload and unit call rides the same control socket. Closing
//! tears the socket down; a session that failed to open never issues
//! remote commands.

use std::path::Path;

use log::debug;

use crate::defaults;
use crate::error::DeployError;
use crate::infrastructure::runner::CommandRunner;
use crate::locations;
use crate::reservation::Node;
use crate::unit::ExecutableUnit;

/// Connection settings shared by every session of a deployment.
#[derive(Debug, Clone)]
pub struct SshAuth {
    pub key_path: Option<String>,
    pub connect_timeout_s: u32,
}

impl Default for SshAuth {
    fn default() -> Self {
        SshAuth {
            key_path: None,
            connect_timeout_s: defaults::CONNECT_TIMEOUT_S,
        }
    }
}

impl SshAuth {
    pub fn with_key(key_path: impl Into<String>) -> Self {
        SshAuth {
            key_path: Some(key_path.into()),
            ..SshAuth::default()
        }
    }
}

pub struct RemoteSession<'r> {
    runner: &'r dyn CommandRunner,
    node: Node,
    control_path: String,
    base_args: String,
    open: bool,
}

impl<'r> RemoteSession<'r> {
    /// Build a session for `node`. No connection is made until `open`.
    pub fn new(runner: &'r dyn CommandRunner, node: Node, auth: &SshAuth) -> Self {
        let control_path = format!(
            "/tmp/spark-deploy-{}-{}.sock",
            node.node_id, node.ip_public
        );
        let mut base_args = format!(
            "-o IdentitiesOnly=yes -o StrictHostKeyChecking=no -o ConnectTimeout={}",
            auth.connect_timeout_s
        );
        if let Some(key) = &auth.key_path {
            base_args.push_str(&format!(" -i {}", key));
        }
        RemoteSession {
            runner,
            node,
            control_path,
            base_args,
            open: false,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn hostname(&self) -> &str {
        &self.node.hostname
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// SSH transport string for tools (scp, rsync) that tunnel over the
    /// control socket.
    pub fn transport(&self) -> String {
        format!("ssh {} -o ControlPath={}", self.base_args, self.control_path)
    }

    pub(crate) fn runner(&self) -> &'r dyn CommandRunner {
        self.runner
    }

    /// Open the ControlMaster connection and probe it with a round trip.
    pub fn open(&mut self) -> Result<(), DeployError> {
        let target = self.node.ssh_target();
        debug!("opening session to {}", target);
        let master = format!(
            "ssh {} -M -N -f -S {} {}",
            self.base_args, self.control_path, target
        );
        self.runner
            .run(&master)
            .map_err(|e| DeployError::connection(&self.node.hostname, e))?;
        let probe = format!(
            "ssh {} -S {} {} 'echo ok'",
            self.base_args, self.control_path, target
        );
        let out = self
            .runner
            .run(&probe)
            .map_err(|e| DeployError::connection(&self.node.hostname, e))?;
        if out.trim() != "ok" {
            return Err(DeployError::connection(
                &self.node.hostname,
                format!("probe returned {:?}", out.trim()),
            ));
        }
        self.open = true;
        Ok(())
    }

    /// Run a command on the node. `Ok` carries the remote stdout.
    pub fn run(&self, cmd: &str) -> Result<String, DeployError> {
        if !self.open {
            return Err(DeployError::connection(
                &self.node.hostname,
                "session is not open",
            ));
        }
        let full = format!(
            "ssh {} -S {} {} '{}'",
            self.base_args,
            self.control_path,
            self.node.ssh_target(),
            shell_single_quote(cmd)
        );
        self.runner
            .run(&full)
            .map_err(|e| DeployError::remote(&self.node.hostname, e))
    }

    /// Copy a local file or directory onto the node over the control
    /// socket.
    pub fn upload(&self, local: &Path, remote: &str) -> Result<(), DeployError> {
        if !self.open {
            return Err(DeployError::connection(
                &self.node.hostname,
                "session is not open",
            ));
        }
        let cmd = format!(
            "scp {} -o ControlPath={} -r {} {}:{}",
            self.base_args,
            self.control_path,
            local.display(),
            self.node.ssh_target(),
            remote
        );
        self.runner
            .run(&cmd)
            .map_err(|e| DeployError::remote(&self.node.hostname, e))?;
        Ok(())
    }

    /// Stage a packaged unit on the node and return a callable handle.
    ///
    /// The unit is written locally under `gen_dir`, the remote staging
    /// directory is created, and the file is copied to its deterministic
    /// staged path.
    pub fn load_unit(
        &self,
        unit: &ExecutableUnit,
        gen_dir: &Path,
    ) -> Result<RemoteUnit<'_, 'r>, DeployError> {
        let local = unit.write_to(gen_dir)?;
        self.run(&format!("mkdir -p {}", locations::UNIT_STAGING_DIR))?;
        let staged = locations::staged_unit(unit.name());
        self.upload(&local, &staged)?;
        Ok(RemoteUnit {
            session: self,
            path: staged,
        })
    }

    /// Tear the control connection down. Close failures are ignored; the
    /// socket dies with the master process either way.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        let cmd = format!(
            "ssh {} -S {} -O exit {}",
            self.base_args,
            self.control_path,
            self.node.ssh_target()
        );
        let _ = self.runner.run(&cmd);
        self.open = false;
    }
}

/// A staged executable unit on one node.
pub struct RemoteUnit<'s, 'r> {
    session: &'s RemoteSession<'r>,
    path: String,
}

impl RemoteUnit<'_, '_> {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Invoke an entry point of the staged unit. A nonzero remote exit
    /// reports as a remote-execution error carrying the unit's output.
    pub fn call(&self, entry: &str, args: &[String]) -> Result<String, DeployError> {
        let mut cmd = format!("python3 {} {}", self.path, entry);
        for arg in args {
            cmd.push(' ');
            cmd.push_str(&shell_double_quote(arg));
        }
        self.session.run(&cmd)
    }
}

/// Escape for embedding in a single-quoted shell string.
fn shell_single_quote(s: &str) -> String {
    s.replace('\'', r"'\''")
}

/// Wrap in double quotes, escaping the characters the remote shell still
/// interprets inside them. Keeps an argument that itself contains quotes
/// (e.g. a spark-submit line with `--driver-java-options "..."`) as one
/// argv entry on the remote side.
fn shell_double_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::runner::MockRunner;
    use crate::payload;

    fn node() -> Node {
        Node {
            node_id: 0,
            hostname: "node0".to_string(),
            ip_public: "35.0.0.10".to_string(),
            ip_local: "10.0.0.10".to_string(),
            user: "ubuntu".to_string(),
        }
    }

    fn ok_probe() -> MockRunner {
        MockRunner::new().respond("echo ok", Ok("ok\n".into()))
    }

    #[test]
    fn open_issues_master_and_probe() {
        let runner = ok_probe();
        let mut session = RemoteSession::new(&runner, node(), &SshAuth::default());
        session.open().unwrap();
        let cmds = runner.executed_commands();
        assert!(cmds[0].contains("-M -N -f -S /tmp/spark-deploy-0-35.0.0.10.sock"));
        assert!(cmds[0].contains("ubuntu@35.0.0.10"));
        assert!(cmds[1].contains("echo ok"));
        assert!(session.is_open());
    }

    #[test]
    fn open_fails_on_bad_probe() {
        let runner = MockRunner::new().respond("echo ok", Ok("garbage".into()));
        let mut session = RemoteSession::new(&runner, node(), &SshAuth::default());
        let err = session.open().unwrap_err();
        assert!(matches!(err, DeployError::Connection { .. }));
        assert!(!session.is_open());
    }

    #[test]
    fn run_requires_open_session() {
        let runner = MockRunner::new();
        let session = RemoteSession::new(&runner, node(), &SshAuth::default());
        assert!(session.run("ls").is_err());
        assert!(runner.executed_commands().is_empty());
    }

    #[test]
    fn run_quotes_remote_command() {
        let runner = ok_probe();
        let mut session = RemoteSession::new(&runner, node(), &SshAuth::default());
        session.open().unwrap();
        session.run("echo 'hi there'").unwrap();
        let last = runner.executed_commands().pop().unwrap();
        assert!(last.contains("-S /tmp/spark-deploy-0-35.0.0.10.sock"));
        assert!(last.contains(r"echo '\''hi there'\''"));
    }

    #[test]
    fn key_path_lands_in_ssh_args() {
        let runner = ok_probe();
        let auth = SshAuth::with_key("/home/me/.ssh/cluster");
        let mut session = RemoteSession::new(&runner, node(), &auth);
        session.open().unwrap();
        assert!(runner.executed_commands()[0].contains("-i /home/me/.ssh/cluster"));
    }

    #[test]
    fn close_is_idempotent_and_ignores_errors() {
        let runner = ok_probe().respond("-O exit", Err("already gone".into()));
        let mut session = RemoteSession::new(&runner, node(), &SshAuth::default());
        session.open().unwrap();
        session.close();
        session.close();
        assert_eq!(runner.count_matching("-O exit"), 1);
        assert!(!session.is_open());
    }

    #[test]
    fn load_unit_stages_and_calls() {
        let runner = ok_probe();
        let mut session = RemoteSession::new(&runner, node(), &SshAuth::default());
        session.open().unwrap();
        let unit = payload::spark_stop_unit().unwrap();
        let gen_dir = std::env::temp_dir().join("spark-deploy-test-session");
        let handle = session.load_unit(&unit, &gen_dir).unwrap();
        handle
            .call("stop_all", &["~/deps/spark".to_string()])
            .unwrap();
        let cmds = runner.executed_commands();
        assert!(cmds.iter().any(|c| c.contains("mkdir -p ~/.spark_deploy/units")));
        assert!(cmds.iter().any(|c| c.starts_with("scp ")
            && c.contains(":~/.spark_deploy/units/spark_stop.py")));
        assert!(cmds
            .iter()
            .any(|c| c.contains("python3 ~/.spark_deploy/units/spark_stop.py stop_all")));
    }

    #[test]
    fn call_arguments_with_embedded_quotes_stay_one_word() {
        let runner = ok_probe();
        let mut session = RemoteSession::new(&runner, node(), &SshAuth::default());
        session.open().unwrap();
        let unit = payload::spark_submit_unit().unwrap();
        let gen_dir = std::env::temp_dir().join("spark-deploy-test-session-quote");
        let handle = session.load_unit(&unit, &gen_dir).unwrap();
        handle
            .call(
                "submit_app",
                &[
                    r#"bin/spark-submit --driver-java-options "-Dlog.level=debug -Xss4m" app.jar"#
                        .to_string(),
                    "~/app".to_string(),
                ],
            )
            .unwrap();
        let call = runner
            .executed_commands()
            .into_iter()
            .find(|c| c.contains("submit_app"))
            .unwrap();
        // The inner quotes are backslash-escaped, so the remote shell hands
        // the whole command line to the entry point as a single argument.
        assert!(call.contains(r#"\"-Dlog.level=debug -Xss4m\""#));
        assert!(!call.contains(r#" "-Dlog.level=debug"#));
    }

    #[test]
    fn call_arguments_escape_shell_metacharacters() {
        assert_eq!(shell_double_quote("plain"), r#""plain""#);
        assert_eq!(shell_double_quote(r#"a"b"#), r#""a\"b""#);
        assert_eq!(shell_double_quote("$HOME `id` a\\b"), r#""\$HOME \`id\` a\\b""#);
    }
}
