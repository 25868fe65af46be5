//! The close-click interception engine: permission gate, event tap,
//! element classification, window census, decision state machine, and the
//! multi-window prompt.

pub mod orchestrator;
pub mod scheduler;

#[cfg(target_os = "macos")]
pub mod census;
#[cfg(target_os = "macos")]
pub mod permissions;
#[cfg(target_os = "macos")]
pub mod prompt;
#[cfg(target_os = "macos")]
pub mod tap;
#[cfg(target_os = "macos")]
pub mod target;

/// Upper bound for every Accessibility query against a foreign process.
/// Keeps the tap callback's worst-case latency bounded when the target
/// application is unresponsive.
#[cfg(target_os = "macos")]
pub(crate) const AX_MESSAGING_TIMEOUT_SECS: f32 = 0.5;

const CLOSE_BUTTON_ROLE: &str = "AXButton";
const CLOSE_BUTTON_SUBROLE: &str = "AXCloseButton";

/// The UI element resolved under a click. Built per click, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickTarget {
    pub pid: i32,
    pub role: String,
    pub subrole: String,
}

impl ClickTarget {
    /// Whether this element is a window's close control, as opposed to any
    /// other button or chrome element.
    pub fn is_close_control(&self) -> bool {
        self.role == CLOSE_BUTTON_ROLE && self.subrole == CLOSE_BUTTON_SUBROLE
    }
}

/// A positively identified running application. The pid identifies the
/// process for the lifetime of one decision; the bundle id is the stable
/// key used for exemptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRef {
    pub pid: i32,
    pub bundle_id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_button_role_and_subrole_match() {
        let target = ClickTarget {
            pid: 42,
            role: "AXButton".to_string(),
            subrole: "AXCloseButton".to_string(),
        };
        assert!(target.is_close_control());
    }

    #[test]
    fn other_buttons_do_not_match() {
        let minimize = ClickTarget {
            pid: 42,
            role: "AXButton".to_string(),
            subrole: "AXMinimizeButton".to_string(),
        };
        assert!(!minimize.is_close_control());

        let plain = ClickTarget {
            pid: 42,
            role: "AXButton".to_string(),
            subrole: String::new(),
        };
        assert!(!plain.is_close_control());

        let not_a_button = ClickTarget {
            pid: 42,
            role: "AXStaticText".to_string(),
            subrole: "AXCloseButton".to_string(),
        };
        assert!(!not_a_button.is_close_control());
    }
}
