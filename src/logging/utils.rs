//! Log file location, ANSI stripping and timestamps.
use std::path::PathBuf;

/// Overrides the log directory.
pub(super) const LOG_DIR_ENV: &str = "SMB_ZFS_LOG_DIR";

/// Remove ANSI CSI sequences (`ESC [ ... final`) and lone escapes.
pub(super) fn strip_ansi(s: &str) -> String {
    #[derive(Clone, Copy)]
    enum State {
        Text,
        Escape,
        Csi,
    }

    let mut out = String::with_capacity(s.len());
    let mut state = State::Text;
    for c in s.chars() {
        state = match (state, c) {
            (State::Text, '\x1b') => State::Escape,
            (State::Text, c) => {
                out.push(c);
                State::Text
            }
            (State::Escape, '[') => State::Csi,
            // a two-character escape such as `ESC M` ends here as well
            (State::Escape, _) | (State::Csi, '@'..='~') => State::Text,
            (State::Csi, _) => State::Csi,
        };
    }
    out
}

/// Directory for log files: `$SMB_ZFS_LOG_DIR`, else
/// `$XDG_CACHE_HOME/smb-zfs`, else `~/.cache/smb-zfs`.  Created on demand.
pub(super) fn log_dir() -> Option<PathBuf> {
    let dir = match std::env::var_os(LOG_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => std::env::var_os("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".cache")))?
            .join("smb-zfs"),
    };
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Log file for one command, e.g. `create-user.log`.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    Some(log_dir()?.join(format!("{command}.log")))
}

/// RFC 3339 timestamp with second precision, for run headers.
pub(super) fn timestamp() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// `HH:MM:SS`, for individual lines.
pub(super) fn clock() -> String {
    chrono::Utc::now().format("%H:%M:%S").to_string()
}
