//! Launch-at-login registration.
//!
//! Enabling writes a LaunchAgent property list under the user's
//! `Library/LaunchAgents` pointing at the current executable; disabling
//! removes it. Takes effect at the next login, no restart required.

use std::io;
use std::path::{Path, PathBuf};

const LAUNCH_AGENT_LABEL: &str = "com.quitsense.app";

#[derive(Debug)]
pub enum AutostartError {
    Io(io::Error),
    NoHomeDir,
    NoExecutablePath,
}

impl From<io::Error> for AutostartError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

fn agent_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| {
        h.join("Library")
            .join("LaunchAgents")
            .join(format!("{LAUNCH_AGENT_LABEL}.plist"))
    })
}

pub fn is_enabled() -> bool {
    agent_path().map(|p| p.exists()).unwrap_or(false)
}

pub fn enable() -> Result<(), AutostartError> {
    let path = agent_path().ok_or(AutostartError::NoHomeDir)?;
    let exec = std::env::current_exe()
        .ok()
        .and_then(|p| p.to_str().map(String::from))
        .ok_or(AutostartError::NoExecutablePath)?;
    write_agent(&path, &exec)
}

pub fn disable() -> Result<(), AutostartError> {
    let path = agent_path().ok_or(AutostartError::NoHomeDir)?;
    remove_agent(&path)
}

fn write_agent(path: &Path, exec_path: &str) -> Result<(), AutostartError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, agent_plist(exec_path))?;
    Ok(())
}

fn remove_agent(path: &Path) -> Result<(), AutostartError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn agent_plist(exec_path: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{LAUNCH_AGENT_LABEL}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{exec_path}</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
    <key>KeepAlive</key>
    <false/>
</dict>
</plist>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plist_names_label_and_executable() {
        let plist = agent_plist("/Applications/QuitSense.app/Contents/MacOS/quitsense");
        assert!(plist.contains(LAUNCH_AGENT_LABEL));
        assert!(plist.contains("/Applications/QuitSense.app/Contents/MacOS/quitsense"));
        assert!(plist.contains("<key>RunAtLoad</key>"));
        assert!(plist.contains("<true/>"));
    }

    #[test]
    fn write_then_remove_agent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("LaunchAgents").join("test.plist");

        write_agent(&path, "/usr/local/bin/quitsense").expect("write agent");
        assert!(path.exists());

        remove_agent(&path).expect("remove agent");
        assert!(!path.exists());
    }

    #[test]
    fn removing_missing_agent_is_ok() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.plist");
        remove_agent(&path).expect("remove missing agent");
    }
}
