//! Accessibility-trust gate.
//!
//! Trust is a steady state, not an error: until the user grants it in
//! System Settings nothing works, so the gate triggers the consent prompt
//! once and polls until granted. Nothing here ever fails loudly.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const TRUST_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub const ACCESSIBILITY_SETTINGS_URL: &str =
    "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustState {
    Unknown,
    Granted,
    Polling,
}

pub struct PermissionGate {
    state: Arc<Mutex<TrustState>>,
}

impl PermissionGate {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TrustState::Unknown)),
        }
    }

    pub fn is_trusted(&self) -> bool {
        let trusted = ax_is_process_trusted();
        if trusted {
            if let Ok(mut state) = self.state.lock() {
                *state = TrustState::Granted;
            }
        }
        trusted
    }

    pub fn current_state(&self) -> TrustState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(TrustState::Unknown)
    }

    /// Trigger the OS consent prompt if untrusted and poll once a second
    /// until granted, then invoke `on_granted` exactly once. Polling runs
    /// for the life of the process if the user never grants access.
    pub fn request_trust_and_poll(&self, on_granted: impl FnOnce() + Send + 'static) {
        if self.is_trusted() {
            on_granted();
            return;
        }
        {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            if *state == TrustState::Polling {
                crate::diag::log("trust poll already running; ignoring repeated request");
                return;
            }
            *state = TrustState::Polling;
        }

        // The OS de-duplicates its own consent dialog, so re-requesting
        // before a grant is harmless.
        ax_request_trust_with_prompt();
        crate::diag::log("accessibility trust not granted; prompted user, polling");

        let state = Arc::clone(&self.state);
        thread::spawn(move || loop {
            thread::sleep(TRUST_POLL_INTERVAL);
            if ax_is_process_trusted() {
                if let Ok(mut state) = state.lock() {
                    *state = TrustState::Granted;
                }
                crate::diag::log("accessibility trust granted");
                on_granted();
                break;
            }
        });
    }
}

impl Default for PermissionGate {
    fn default() -> Self {
        Self::new()
    }
}

fn ax_is_process_trusted() -> bool {
    unsafe { accessibility_sys::AXIsProcessTrusted() }
}

fn ax_request_trust_with_prompt() -> bool {
    unsafe {
        use core_foundation::base::TCFType;
        use core_foundation::boolean::CFBoolean;
        use core_foundation::dictionary::CFDictionary;
        use core_foundation::string::CFString;

        let key = CFString::wrap_under_get_rule(accessibility_sys::kAXTrustedCheckOptionPrompt);
        let dict = CFDictionary::from_CFType_pairs(&[(key, CFBoolean::true_value())]);
        accessibility_sys::AXIsProcessTrustedWithOptions(dict.as_concrete_TypeRef())
    }
}

/// The one user-visible affordance when trust is missing: a direct jump to
/// the Accessibility pane in System Settings. Hook for the settings
/// surface, to pair with a `Status` showing `accessibility_trusted: false`.
pub fn open_accessibility_settings() {
    if let Err(err) = std::process::Command::new("open")
        .arg(ACCESSIBILITY_SETTINGS_URL)
        .spawn()
    {
        crate::diag::log(&format!("failed to open accessibility settings: {err}"));
    }
}
