pub mod autostart;
pub mod diag;
pub mod exemptions;
pub mod i18n;
pub mod interceptor;

use serde::Serialize;

/// Stable identifier for this application; the exemption key under which
/// the engine recognizes itself, and the namespace for config and cache
/// files.
pub const BUNDLE_ID: &str = "com.quitsense.app";

pub const APP_NAME: &str = "QuitSense";

/// Snapshot for the status indicator: when `accessibility_trusted` is
/// false the engine is inactive and the user should be pointed at the
/// settings pane.
#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct Status {
    pub accessibility_trusted: bool,
    pub tap_active: bool,
}

#[cfg(target_os = "macos")]
pub fn status(
    gate: &interceptor::permissions::PermissionGate,
    tap: &interceptor::tap::TapController,
) -> Status {
    Status {
        accessibility_trusted: gate.is_trusted(),
        tap_active: tap.is_active(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_inactive() {
        let status = Status::default();
        assert!(!status.accessibility_trusted);
        assert!(!status.tap_active);
    }

    #[test]
    fn status_serializes_for_reporting() {
        let status = Status {
            accessibility_trusted: true,
            tap_active: true,
        };
        let json = serde_json::to_string(&status).expect("serialize");
        assert!(json.contains("\"accessibility_trusted\":true"));
        assert!(json.contains("\"tap_active\":true"));
    }
}
