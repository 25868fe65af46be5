//! Persisted set of application identifiers the engine never intervenes on.
//!
//! Stored as a JSON array of bundle identifiers under the user config
//! directory. Seeded with a default list on first run; the host's own
//! identifier is always present so the engine can never act on itself
//! through the exemption path either.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::interceptor::orchestrator::ExemptionOracle;

/// Applications that commonly keep running without windows, or that users
/// overwhelmingly expect to survive a window close.
const DEFAULT_EXEMPT_IDS: &[&str] = &[
    "com.apple.finder",
    "com.apple.loginwindow",
    "com.apple.SystemSettings",
    "com.apple.Safari",
    "com.apple.mail",
    "com.apple.Music",
    "com.apple.Terminal",
    "com.google.Chrome",
    "org.mozilla.firefox",
    "com.microsoft.VSCode",
    "com.apple.dt.Xcode",
    "com.spotify.client",
    "com.tinyspeck.slackmacgap",
    "org.telegram.desktop",
    "io.iterm.iTerm2",
];

#[derive(Debug)]
pub enum ExemptionsError {
    Io(io::Error),
    Json(serde_json::Error),
    NoConfigDir,
}

impl From<io::Error> for ExemptionsError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<serde_json::Error> for ExemptionsError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error)
    }
}

pub struct Exemptions {
    entries: BTreeSet<String>,
    path: Option<PathBuf>,
}

fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(crate::BUNDLE_ID).join("exemptions.json"))
}

impl Exemptions {
    /// Load from the default config location, seeding defaults when the file
    /// is missing or unreadable.
    pub fn load() -> Self {
        let path = default_path();
        match &path {
            Some(p) => Self::load_from(p.clone()),
            None => {
                crate::diag::log("exemptions: no config dir; running with in-memory defaults");
                let mut exemptions = Self {
                    entries: BTreeSet::new(),
                    path: None,
                };
                exemptions.seed();
                exemptions
            }
        }
    }

    pub fn load_from(path: PathBuf) -> Self {
        let entries = read_entries(&path).unwrap_or_default();
        let mut exemptions = Self {
            entries,
            path: Some(path),
        };
        if exemptions.entries.is_empty() {
            exemptions.seed();
        }
        // The host id must always be present, even in a pre-existing file.
        if exemptions.entries.insert(crate::BUNDLE_ID.to_string()) {
            if let Err(err) = exemptions.save() {
                crate::diag::log(&format!("exemptions: failed to persist self id: {err:?}"));
            }
        }
        exemptions
    }

    fn seed(&mut self) {
        self.entries = DEFAULT_EXEMPT_IDS
            .iter()
            .map(|id| id.to_string())
            .collect();
        self.entries.insert(crate::BUNDLE_ID.to_string());
        if let Err(err) = self.save() {
            crate::diag::log(&format!("exemptions: failed to write seeded set: {err:?}"));
        }
    }

    pub fn contains(&self, bundle_id: &str) -> bool {
        self.entries.contains(bundle_id)
    }

    pub fn add(&mut self, bundle_id: String) -> Result<(), ExemptionsError> {
        if self.entries.insert(bundle_id) {
            self.save()?;
        }
        Ok(())
    }

    pub fn remove(&mut self, bundle_id: &str) -> Result<(), ExemptionsError> {
        // The host id is not removable; the self-protection invariant must
        // hold no matter what the settings surface does.
        if bundle_id == crate::BUNDLE_ID {
            return Ok(());
        }
        if self.entries.remove(bundle_id) {
            self.save()?;
        }
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn save(&self) -> Result<(), ExemptionsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        write_entries(path, &self.entries)
    }
}

impl ExemptionOracle for Exemptions {
    fn contains(&self, bundle_id: &str) -> bool {
        Exemptions::contains(self, bundle_id)
    }
}

/// Shared handle for the tap callback. The mutex is taken for the
/// membership test alone, never across the slower Accessibility queries,
/// so a settings-surface mutation (which writes the file under the same
/// mutex) can only ever delay the callback by one set lookup.
#[derive(Clone)]
pub struct SharedExemptions(Arc<Mutex<Exemptions>>);

impl SharedExemptions {
    pub fn new(inner: Arc<Mutex<Exemptions>>) -> Self {
        Self(inner)
    }
}

impl ExemptionOracle for SharedExemptions {
    fn contains(&self, bundle_id: &str) -> bool {
        // A poisoned store gives no reliable answer; treat the app as
        // exempt so the engine stands down rather than acting blind.
        match self.0.lock() {
            Ok(exemptions) => exemptions.contains(bundle_id),
            Err(_) => true,
        }
    }
}

fn read_entries(path: &Path) -> Option<BTreeSet<String>> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Vec<String>>(&contents) {
        Ok(list) => Some(list.into_iter().collect()),
        Err(err) => {
            crate::diag::log(&format!("exemptions: unreadable file, reseeding: {err}"));
            None
        }
    }
}

fn write_entries(path: &Path, entries: &BTreeSet<String>) -> Result<(), ExemptionsError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let list: Vec<&str> = entries.iter().map(String::as_str).collect();
    let json = serde_json::to_string_pretty(&list)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, Exemptions) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("exemptions.json");
        let exemptions = Exemptions::load_from(path);
        (dir, exemptions)
    }

    #[test]
    fn first_run_seeds_defaults_and_self() {
        let (_dir, exemptions) = temp_store();
        assert!(exemptions.contains("com.apple.finder"));
        assert!(exemptions.contains(crate::BUNDLE_ID));
        assert!(exemptions.len() > DEFAULT_EXEMPT_IDS.len());
    }

    #[test]
    fn add_and_remove_persist_across_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("exemptions.json");

        let mut exemptions = Exemptions::load_from(path.clone());
        exemptions.add("com.example.App".to_string()).expect("add");
        exemptions.remove("com.apple.finder").expect("remove");

        let reloaded = Exemptions::load_from(path);
        assert!(reloaded.contains("com.example.App"));
        assert!(!reloaded.contains("com.apple.finder"));
    }

    #[test]
    fn self_id_cannot_be_removed() {
        let (_dir, mut exemptions) = temp_store();
        exemptions.remove(crate::BUNDLE_ID).expect("remove");
        assert!(exemptions.contains(crate::BUNDLE_ID));
    }

    #[test]
    fn corrupt_file_reseeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("exemptions.json");
        std::fs::write(&path, "not valid json").expect("write corrupt file");

        let exemptions = Exemptions::load_from(path);
        assert!(exemptions.contains("com.apple.finder"));
        assert!(exemptions.contains(crate::BUNDLE_ID));
    }

    #[test]
    fn existing_file_gains_self_id_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("exemptions.json");
        std::fs::write(&path, r#"["com.example.Only"]"#).expect("write");

        let exemptions = Exemptions::load_from(path.clone());
        assert!(exemptions.contains("com.example.Only"));
        assert!(exemptions.contains(crate::BUNDLE_ID));

        let contents = std::fs::read_to_string(&path).expect("read");
        assert!(contents.contains(crate::BUNDLE_ID));
    }

    #[test]
    fn shared_handle_answers_membership_and_releases_the_lock() {
        let (_dir, exemptions) = temp_store();
        let store = Arc::new(Mutex::new(exemptions));
        let shared = SharedExemptions::new(Arc::clone(&store));

        assert!(ExemptionOracle::contains(&shared, "com.apple.finder"));
        assert!(!ExemptionOracle::contains(&shared, "com.example.Absent"));
        // Each call must leave the mutex free for mutating callers.
        assert!(store.try_lock().is_ok());
    }

    #[test]
    fn adding_duplicate_is_a_no_op() {
        let (_dir, mut exemptions) = temp_store();
        let before = exemptions.len();
        exemptions
            .add("com.apple.finder".to_string())
            .expect("add duplicate");
        assert_eq!(exemptions.len(), before);
    }
}
