//! Well-known file locations shared by the daemon and the CLI

use std::path::PathBuf;

/// Default configuration file, before tilde expansion
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/keyguide/config.kdl";

/// Location of the daemon's pid file.
///
/// Returns `$XDG_RUNTIME_DIR/keyguide.pid` if the environment variable is
/// set, otherwise falls back to `/tmp/keyguide-$UID.pid`.
pub fn pid_file_path() -> PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir).join("keyguide.pid"),
        _ => PathBuf::from(format!("/tmp/keyguide-{}.pid", nix::unistd::getuid())),
    }
}

/// Expand a leading `~` in a user-supplied path
pub fn expand_path(path: &str) -> PathBuf {
    shellexpand::tilde(path).into_owned().into()
}
