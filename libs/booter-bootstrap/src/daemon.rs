use std::ffi::OsStr;

use daemonize_me::Daemon;

/// Detaches into the background. The child keeps the current working
/// directory so relative config paths still resolve; the parent exits.
pub(crate) fn daemonize(pname: &str) -> Result<(), crate::LaunchError> {
    let work_dir = std::env::current_dir().map_err(crate::LaunchError::WorkDir)?;
    Daemon::new()
        .work_dir(work_dir)
        .name(OsStr::new(pname))
        .start()?;
    Ok(())
}
