//! Top-level window count for a running application.
//!
//! One bounded Accessibility query against the application's window
//! collection. The count decides whether a close click is "simple" (last
//! window, quit the app too) or "ambiguous" (more windows, ask). Unknown
//! counts resolve to 1 so a failed query can never force a prompt.

use super::orchestrator::WindowCounter;
use super::target::CfRef;
use super::AX_MESSAGING_TIMEOUT_SECS;

const FALLBACK_WINDOW_COUNT: usize = 1;

pub fn count_windows(pid: i32) -> usize {
    use accessibility_sys::{
        kAXWindowsAttribute, AXUIElementCopyAttributeValue, AXUIElementCreateApplication,
        AXUIElementSetMessagingTimeout,
    };
    use core_foundation::array::{CFArrayGetCount, CFArrayGetTypeID};
    use core_foundation::base::{CFGetTypeID, CFTypeRef, TCFType};
    use core_foundation::string::CFString;

    unsafe {
        let Some(app) = CfRef::wrap(AXUIElementCreateApplication(pid) as *mut _) else {
            return FALLBACK_WINDOW_COUNT;
        };
        AXUIElementSetMessagingTimeout(app.as_type(), AX_MESSAGING_TIMEOUT_SECS);

        let attr = CFString::new(kAXWindowsAttribute);
        let mut value: CFTypeRef = std::ptr::null_mut();
        let result =
            AXUIElementCopyAttributeValue(app.as_type(), attr.as_concrete_TypeRef(), &mut value);
        if result != 0 {
            crate::diag::log(&format!(
                "window census for pid {pid} failed (AXError {result}); assuming single window"
            ));
            return FALLBACK_WINDOW_COUNT;
        }
        let Some(guard) = CfRef::wrap(value as *mut _) else {
            return FALLBACK_WINDOW_COUNT;
        };
        if CFGetTypeID(guard.as_ptr() as _) != CFArrayGetTypeID() {
            return FALLBACK_WINDOW_COUNT;
        }

        let count = CFArrayGetCount(guard.as_ptr() as _) as usize;
        if count == 0 {
            FALLBACK_WINDOW_COUNT
        } else {
            count
        }
    }
}

/// Live census handed to the decision engine.
pub struct AxWindowCensus;

impl WindowCounter for AxWindowCensus {
    fn count_windows(&self, pid: i32) -> usize {
        count_windows(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_pid_falls_back_to_single_window() {
        assert_eq!(count_windows(-1), 1);
    }

    #[test]
    fn own_windowless_process_counts_as_single_window() {
        // The test binary has no windows; with or without accessibility
        // trust the answer is the fail-safe default.
        let own_pid = std::process::id() as i32;
        assert_eq!(count_windows(own_pid), 1);
    }
}
