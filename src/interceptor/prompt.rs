//! The multi-window prompt and the re-synthesized close intent.
//!
//! Presentation is strictly a UI-thread affair; the tap callback only ever
//! enqueues a prompt action. The host is brought to the foreground first
//! so the modal is not buried under the application the user clicked in.

use objc2::MainThreadMarker;
use objc2_app_kit::{NSAlert, NSApplicationActivationOptions, NSRunningApplication};
use objc2_foundation::NSString;

use super::AppRef;
use crate::i18n;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    QuitApp,
    CloseWindowOnly,
    Cancel,
}

// NSAlert modal responses: 1000 = first button, 1001 = second, 1002 = third.
const FIRST_BUTTON: isize = 1000;
const SECOND_BUTTON: isize = 1001;

pub fn choice_for_response(response: isize) -> PromptChoice {
    match response {
        FIRST_BUTTON => PromptChoice::QuitApp,
        SECOND_BUTTON => PromptChoice::CloseWindowOnly,
        _ => PromptChoice::Cancel,
    }
}

/// Present the three-way choice for `app`. Modal; blocks the UI thread
/// until the user answers. Called off the main thread this degrades to
/// `Cancel` rather than corrupting AppKit state.
pub fn present_choice(app: &AppRef) -> PromptChoice {
    let Some(mtm) = MainThreadMarker::new() else {
        crate::diag::log("prompt requested off the UI thread; treating as cancel");
        return PromptChoice::Cancel;
    };

    activate_host();

    let locale = i18n::system_locale();
    let alert = NSAlert::new(mtm);
    unsafe {
        alert.setMessageText(&NSString::from_str(i18n::prompt_title(locale)));
        alert.setInformativeText(&NSString::from_str(i18n::prompt_message(locale)));
        alert.addButtonWithTitle(&NSString::from_str(i18n::choice_quit_app(locale)));
        alert.addButtonWithTitle(&NSString::from_str(i18n::choice_close_window(locale)));
        alert.addButtonWithTitle(&NSString::from_str(i18n::choice_cancel(locale)));
    }

    let response = unsafe { alert.runModal() };
    let choice = choice_for_response(response);
    crate::diag::log(&format!(
        "prompt for {} answered with {:?}",
        app.bundle_id, choice
    ));
    choice
}

fn activate_host() {
    let host = NSRunningApplication::currentApplication();
    host.activateWithOptions(
        NSApplicationActivationOptions::NSApplicationActivateIgnoringOtherApps,
    );
}

const KEY_CODE_COMMAND: core_graphics::event::CGKeyCode = 0x37;
const KEY_CODE_W: core_graphics::event::CGKeyCode = 0x0D;

/// Post the platform's standard close-window shortcut at whatever now has
/// focus. The caller activates the target application and waits for the
/// settle delay first.
pub fn synthesize_close_keystroke() -> Result<(), String> {
    use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation};
    use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};

    let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
        .map_err(|()| "failed to create HID event source".to_string())?;

    let cmd_down = CGEvent::new_keyboard_event(source.clone(), KEY_CODE_COMMAND, true)
        .map_err(|()| "failed to create modifier-down event".to_string())?;
    let key_down = CGEvent::new_keyboard_event(source.clone(), KEY_CODE_W, true)
        .map_err(|()| "failed to create key-down event".to_string())?;
    let key_up = CGEvent::new_keyboard_event(source.clone(), KEY_CODE_W, false)
        .map_err(|()| "failed to create key-up event".to_string())?;
    let cmd_up = CGEvent::new_keyboard_event(source, KEY_CODE_COMMAND, false)
        .map_err(|()| "failed to create modifier-up event".to_string())?;

    cmd_down.set_flags(CGEventFlags::CGEventFlagCommand);
    key_down.set_flags(CGEventFlags::CGEventFlagCommand);

    // Strict order: modifier down, key down, key up, modifier up.
    cmd_down.post(CGEventTapLocation::HID);
    key_down.post(CGEventTapLocation::HID);
    key_up.post(CGEventTapLocation::HID);
    cmd_up.post(CGEventTapLocation::HID);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_button_quits_the_app() {
        assert_eq!(choice_for_response(1000), PromptChoice::QuitApp);
    }

    #[test]
    fn second_button_closes_the_window_only() {
        assert_eq!(choice_for_response(1001), PromptChoice::CloseWindowOnly);
    }

    #[test]
    fn third_button_cancels() {
        assert_eq!(choice_for_response(1002), PromptChoice::Cancel);
    }

    #[test]
    fn unexpected_responses_cancel() {
        // Aborted/stopped modal sessions report negative codes.
        assert_eq!(choice_for_response(0), PromptChoice::Cancel);
        assert_eq!(choice_for_response(-1000), PromptChoice::Cancel);
    }
}
