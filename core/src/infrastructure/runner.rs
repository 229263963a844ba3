//! Command runner abstraction for executing local shell commands.
//!
//! `CommandRunner` is the seam every SSH/scp/rsync invocation goes through.
//! `ShellRunner` is the production implementation that spawns `sh -c`.
//! `MockRunner` is the test double; it matches commands against substring
//! rules so responses stay deterministic under concurrent per-node fan-out,
//! and it records every executed command for assertions.

use std::process::Command;
use std::sync::Mutex;

/// Trait for executing shell command strings. `Ok` carries stdout; `Err`
/// carries stderr (or a spawn failure description).
pub trait CommandRunner: Send + Sync {
    fn run(&self, cmd: &str) -> Result<String, String>;
}

/// Production runner that spawns `sh -c <cmd>`.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, cmd: &str) -> Result<String, String> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .output()
            .map_err(|e| format!("failed to execute: {}", e))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).to_string())
        }
    }
}

/// Test-double runner.
///
/// Responses are configured as `(substring pattern, response)` rules; the
/// first rule whose pattern is contained in the command wins. Commands with
/// no matching rule fall back to an ordered response queue, then to
/// `Ok("")`. Rule matching (rather than a purely ordered queue) matters
/// because protocol fan-out runs one thread per node and interleaves
/// commands nondeterministically.
pub struct MockRunner {
    rules: Mutex<Vec<(String, Result<String, String>)>>,
    queue: Mutex<Vec<Result<String, String>>>,
    commands: Mutex<Vec<String>>,
}

impl MockRunner {
    pub fn new() -> Self {
        MockRunner {
            rules: Mutex::new(Vec::new()),
            queue: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Queue ordered responses (for sequential, single-node tests).
    pub fn with_responses(responses: Vec<Result<String, String>>) -> Self {
        let runner = MockRunner::new();
        {
            let mut queue = runner.queue.lock().unwrap();
            *queue = responses;
            queue.reverse();
        }
        runner
    }

    /// Add a substring-matched response rule. Chainable.
    pub fn respond(self, pattern: &str, response: Result<String, String>) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((pattern.to_string(), response));
        self
    }

    /// All commands executed so far, in execution order.
    pub fn executed_commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Count of executed commands containing `pattern`.
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.contains(pattern))
            .count()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, cmd: &str) -> Result<String, String> {
        self.commands.lock().unwrap().push(cmd.to_string());
        let rules = self.rules.lock().unwrap();
        if let Some((_, response)) = rules.iter().find(|(pat, _)| cmd.contains(pat.as_str())) {
            return response.clone();
        }
        drop(rules);
        if let Some(response) = self.queue.lock().unwrap().pop() {
            return response;
        }
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_records_commands() {
        let runner = MockRunner::new();
        runner.run("echo hello").unwrap();
        runner.run("echo world").unwrap();
        let cmds = runner.executed_commands();
        assert_eq!(cmds, vec!["echo hello", "echo world"]);
    }

    #[test]
    fn queued_responses_in_order() {
        let runner = MockRunner::with_responses(vec![
            Ok("first".into()),
            Err("fail".into()),
            Ok("third".into()),
        ]);
        assert_eq!(runner.run("cmd1").unwrap(), "first");
        assert_eq!(runner.run("cmd2").unwrap_err(), "fail");
        assert_eq!(runner.run("cmd3").unwrap(), "third");
    }

    #[test]
    fn rules_match_by_substring() {
        let runner = MockRunner::new()
            .respond("echo ok", Ok("ok\n".into()))
            .respond("rsync", Err("connection closed".into()));
        assert_eq!(runner.run("ssh -S /tmp/x a@b 'echo ok'").unwrap(), "ok\n");
        assert!(runner.run("rsync -az src a@b:dst").is_err());
        // No rule, no queue: empty Ok.
        assert_eq!(runner.run("something else").unwrap(), "");
    }

    #[test]
    fn first_matching_rule_wins() {
        let runner = MockRunner::new()
            .respond("install", Ok("a".into()))
            .respond("install_spark", Ok("b".into()));
        assert_eq!(runner.run("python3 install_spark.py").unwrap(), "a");
    }

    #[test]
    fn count_matching_filters() {
        let runner = MockRunner::new();
        runner.run("scp f1 a@b:dst").unwrap();
        runner.run("scp f2 a@c:dst").unwrap();
        runner.run("ssh a@b 'ls'").unwrap();
        assert_eq!(runner.count_matching("scp"), 2);
    }

    #[test]
    fn usable_across_threads() {
        let runner = MockRunner::new().respond("echo ok", Ok("ok".into()));
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    assert_eq!(runner.run("echo ok").unwrap(), "ok");
                });
            }
        });
        assert_eq!(runner.count_matching("echo ok"), 4);
    }
}
