//! Directory shipping over an open session's control socket.
//!
//! Unit files travel by scp; application trees travel by rsync so repeated
//! submits only transfer what changed. `-L` follows symlinks because
//! application directories routinely symlink shared datasets.

use std::path::Path;

use crate::error::DeployError;
use crate::remote::session::RemoteSession;

/// Mirror `local` into `remote` on the session's node.
/// With `delete` set, files absent locally are removed remotely.
pub fn upload_dir(
    session: &RemoteSession,
    local: &Path,
    remote: &str,
    delete: bool,
) -> Result<(), DeployError> {
    let mut cmd = format!("rsync -azL -e \"{}\"", session.transport());
    if delete {
        cmd.push_str(" --delete");
    }
    // Trailing slash: copy the directory's contents, not the directory.
    cmd.push_str(&format!(
        " {}/ {}:{}/",
        local.display(),
        session.node().ssh_target(),
        remote
    ));
    session
        .runner()
        .run(&cmd)
        .map_err(|e| DeployError::remote(session.hostname(), e))?;
    Ok(())
}
