//! Resolves the UI element under a screen point and the application that
//! owns it, via the Accessibility API.
//!
//! Every query runs under the shared messaging timeout so a hung target
//! application cannot stall the tap callback. Any failure resolves to "not
//! a close button": an ordinary click must never be blocked because we
//! could not classify it.

use super::orchestrator::AppResolver;
use super::{AppRef, ClickTarget, AX_MESSAGING_TIMEOUT_SECS};

use objc2_app_kit::{NSApplicationActivationOptions, NSRunningApplication};

/// RAII guard for CoreFoundation objects. Calls `CFRelease` on drop.
pub(super) struct CfRef(*mut std::ffi::c_void);

impl CfRef {
    /// Wrap a raw CF pointer. Returns `None` if null.
    pub(super) fn wrap(ptr: *mut std::ffi::c_void) -> Option<Self> {
        if ptr.is_null() {
            None
        } else {
            Some(Self(ptr))
        }
    }

    pub(super) fn as_ptr(&self) -> *mut std::ffi::c_void {
        self.0
    }

    /// Reinterpret as a specific CF type pointer.
    pub(super) fn as_type<T>(&self) -> *mut T {
        self.0 as *mut T
    }
}

impl Drop for CfRef {
    fn drop(&mut self) {
        unsafe {
            core_foundation::base::CFRelease(self.0 as *const _);
        }
    }
}

pub(super) fn ax_copy_string_attr(
    element: accessibility_sys::AXUIElementRef,
    attr_name: &str,
) -> Option<String> {
    use accessibility_sys::AXUIElementCopyAttributeValue;
    use core_foundation::base::{CFGetTypeID, CFTypeRef, TCFType};
    use core_foundation::string::CFString;

    unsafe {
        let attr = CFString::new(attr_name);
        let mut value: CFTypeRef = std::ptr::null_mut();
        let result = AXUIElementCopyAttributeValue(element, attr.as_concrete_TypeRef(), &mut value);
        if result != 0 {
            return None;
        }
        let guard = CfRef::wrap(value as *mut _)?;

        if CFGetTypeID(guard.as_ptr() as _) == CFString::type_id() {
            // CfRef owns the reference; wrap_under_get_rule borrows it with
            // a temporary retain.
            let s = CFString::wrap_under_get_rule(guard.as_ptr() as _).to_string();
            let trimmed = s.trim().to_string();
            if trimmed.is_empty() {
                return None;
            }
            return Some(trimmed);
        }

        None
    }
}

/// Resolve the element at the given screen point. Returns a target only
/// for a window's close control owned by an identifiable process; every
/// failure mode maps to `None`.
pub fn resolve(x: f64, y: f64) -> Option<ClickTarget> {
    use accessibility_sys::{
        kAXRoleAttribute, kAXSubroleAttribute, AXUIElementCopyElementAtPosition,
        AXUIElementCreateSystemWide, AXUIElementGetPid, AXUIElementSetMessagingTimeout,
    };

    unsafe {
        let system_wide = CfRef::wrap(AXUIElementCreateSystemWide() as *mut _)?;
        AXUIElementSetMessagingTimeout(system_wide.as_type(), AX_MESSAGING_TIMEOUT_SECS);

        let mut raw_element: accessibility_sys::AXUIElementRef = std::ptr::null_mut();
        let result = AXUIElementCopyElementAtPosition(
            system_wide.as_type(),
            x as f32,
            y as f32,
            &mut raw_element,
        );
        if result != 0 {
            return None;
        }
        let element = CfRef::wrap(raw_element as *mut _)?;
        let el: accessibility_sys::AXUIElementRef = element.as_type();

        let role = ax_copy_string_attr(el, kAXRoleAttribute)?;
        let subrole = ax_copy_string_attr(el, kAXSubroleAttribute)?;

        let mut pid: i32 = 0;
        if AXUIElementGetPid(el, &mut pid) != 0 {
            return None;
        }

        let target = ClickTarget { pid, role, subrole };
        if target.is_close_control() {
            Some(target)
        } else {
            None
        }
    }
}

/// Resolve a pid to a positively identified application. A process without
/// a bundle identifier cannot be matched against the exemption set and is
/// never acted on.
pub fn resolve_app(pid: i32) -> Option<AppRef> {
    let app = NSRunningApplication::runningApplicationWithProcessIdentifier(pid)?;
    let bundle_id = app.bundleIdentifier()?.to_string();
    let name = app
        .localizedName()
        .map(|n| n.to_string())
        .unwrap_or_else(|| bundle_id.clone());
    Some(AppRef {
        pid,
        bundle_id,
        name,
    })
}

pub fn terminate_app(pid: i32) -> bool {
    match NSRunningApplication::runningApplicationWithProcessIdentifier(pid) {
        Some(app) => app.terminate(),
        None => false,
    }
}

pub fn hide_app(pid: i32) -> bool {
    match NSRunningApplication::runningApplicationWithProcessIdentifier(pid) {
        Some(app) => app.hide(),
        None => false,
    }
}

pub fn activate_app(pid: i32) -> bool {
    match NSRunningApplication::runningApplicationWithProcessIdentifier(pid) {
        Some(app) => app.activateWithOptions(
            NSApplicationActivationOptions::NSApplicationActivateIgnoringOtherApps,
        ),
        None => false,
    }
}

/// Live resolver handed to the decision engine.
pub struct RunningAppResolver;

impl AppResolver for RunningAppResolver {
    fn resolve_app(&self, pid: i32) -> Option<AppRef> {
        resolve_app(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_at_screen_origin_does_not_panic() {
        // Without accessibility trust this must quietly return None; with
        // it, whatever sits at (0, 0) is not a close button.
        let _ = resolve(0.0, 0.0);
    }

    #[test]
    fn resolve_app_for_dead_pid_is_none() {
        assert!(resolve_app(-1).is_none());
    }

    #[test]
    fn app_ops_on_dead_pid_return_false() {
        assert!(!terminate_app(-1));
        assert!(!hide_app(-1));
        assert!(!activate_app(-1));
    }

    #[test]
    fn resolve_app_requires_bundle_identity() {
        // The bare test binary has no bundle, so resolving ourselves must
        // fail closed rather than invent an identity.
        let own_pid = std::process::id() as i32;
        if let Some(app) = resolve_app(own_pid) {
            assert!(!app.bundle_id.is_empty());
        }
    }
}
