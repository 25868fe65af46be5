#[cfg(target_os = "macos")]
fn main() {
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    use quitsense::diag;
    use quitsense::exemptions::Exemptions;
    use quitsense::interceptor::permissions::{self, PermissionGate};
    use quitsense::interceptor::scheduler;
    use quitsense::interceptor::tap::{TapContext, TapController};

    init_host_app();

    let exemptions = Arc::new(Mutex::new(Exemptions::load()));
    let (actions_tx, actions_rx) = mpsc::channel();
    let tap = Arc::new(TapController::new(TapContext {
        own_pid: std::process::id() as i32,
        exemptions,
        actions: actions_tx,
    }));

    let gate = PermissionGate::new();
    if gate.is_trusted() {
        tap.start();
    } else {
        // Steady state until the user grants access; the status surface
        // shows "inactive" and offers the settings pane meanwhile.
        diag::log(&format!(
            "waiting for accessibility trust; grant it under {}",
            permissions::ACCESSIBILITY_SETTINGS_URL
        ));
        let tap = Arc::clone(&tap);
        gate.request_trust_and_poll(move || tap.start());
    }

    let status = quitsense::status(&gate, &tap);
    diag::log(&format!(
        "{} started; status {}",
        quitsense::APP_NAME,
        serde_json::to_string(&status).unwrap_or_default()
    ));

    // UI-thread loop: prompts, deferred terminations, keystroke synthesis.
    scheduler::run(actions_rx);
}

#[cfg(target_os = "macos")]
fn init_host_app() {
    use objc2::MainThreadMarker;
    use objc2_app_kit::{NSApplication, NSApplicationActivationPolicy};

    // Accessory policy: no Dock icon, but modal alerts can still come to
    // the foreground.
    let Some(mtm) = MainThreadMarker::new() else {
        return;
    };
    let app = NSApplication::sharedApplication(mtm);
    app.setActivationPolicy(NSApplicationActivationPolicy::Accessory);
}

#[cfg(not(target_os = "macos"))]
fn main() {
    eprintln!("quitsense requires macOS.");
    std::process::exit(1);
}
