//! Global event tap lifecycle and the per-click pipeline.
//!
//! The tap lives on its own thread with its own run loop. The callback
//! runs the full classify-and-decide pipeline synchronously; its worst
//! case is bounded by the Accessibility messaging timeouts, and anything
//! that acts on another application is shipped to the UI thread through
//! the scheduler channel instead of being done in the callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
};

use super::census::AxWindowCensus;
use super::orchestrator::{self, Decision};
use super::scheduler::{Action, Scheduled, TERMINATE_DELAY};
use super::target::{self, RunningAppResolver};
use crate::exemptions::{Exemptions, SharedExemptions};

/// Backoff between attempts when the tap cannot be created (revoked
/// permission, resource exhaustion). Recoverable, never fatal.
pub const TAP_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Everything the tap callback needs, captured at registration time so the
/// callback dispatches into plain instance data rather than global state.
pub struct TapContext {
    pub own_pid: i32,
    pub exemptions: Arc<Mutex<Exemptions>>,
    pub actions: Sender<Scheduled>,
}

pub struct TapController {
    ctx: Arc<TapContext>,
    running: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    run_loop: Arc<Mutex<Option<CFRunLoop>>>,
}

impl TapController {
    pub fn new(ctx: TapContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            running: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicBool::new(false)),
            run_loop: Arc::new(Mutex::new(None)),
        }
    }

    /// Install the tap. Idempotent: a second call while the tap thread is
    /// live is a no-op, so at most one tap exists per process.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let ctx = Arc::clone(&self.ctx);
        let running = Arc::clone(&self.running);
        let active = Arc::clone(&self.active);
        let run_loop = Arc::clone(&self.run_loop);
        thread::spawn(move || run_tap_thread(ctx, running, active, run_loop));
    }

    /// Tear the tap down. The thread observes the cleared flag and exits
    /// its run loop.
    pub fn disable(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Ok(holder) = self.run_loop.lock() {
            if let Some(ref run_loop) = *holder {
                run_loop.stop();
            }
        }
        self.active.store(false, Ordering::SeqCst);
    }

    /// Whether a tap is currently installed and enabled. Status reporting
    /// only; nothing branches on this.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for TapController {
    fn drop(&mut self) {
        self.disable();
    }
}

fn run_tap_thread(
    ctx: Arc<TapContext>,
    running: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    run_loop_holder: Arc<Mutex<Option<CFRunLoop>>>,
) {
    while running.load(Ordering::SeqCst) {
        let cb_ctx = Arc::clone(&ctx);
        let tap_result = CGEventTap::new(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::Default,
            vec![CGEventType::LeftMouseUp],
            move |_proxy, event_type, event| {
                if let CGEventType::LeftMouseUp = event_type {
                    let location = event.location();
                    if handle_click(&cb_ctx, location.x, location.y).consumes_event() {
                        // The wrapper cannot return NULL to drop an event;
                        // nulling the type has the same effect.
                        event.set_type(CGEventType::Null);
                    }
                }
                None
            },
        );

        let tap = match tap_result {
            Ok(tap) => tap,
            Err(()) => {
                crate::diag::log("failed to create event tap; retrying in 3s");
                thread::sleep(TAP_RETRY_DELAY);
                continue;
            }
        };

        let loop_source = match tap.mach_port.create_runloop_source(0) {
            Ok(source) => source,
            Err(()) => {
                crate::diag::log("failed to create run loop source; retrying in 3s");
                thread::sleep(TAP_RETRY_DELAY);
                continue;
            }
        };

        let current_run_loop = CFRunLoop::get_current();
        {
            if let Ok(mut holder) = run_loop_holder.lock() {
                *holder = Some(current_run_loop.clone());
            }
        }

        unsafe {
            current_run_loop.add_source(&loop_source, kCFRunLoopCommonModes);
        }

        tap.enable();
        active.store(true, Ordering::SeqCst);
        crate::diag::log("event tap installed and enabled");

        // kCFRunLoopDefaultMode must be used for running; commonModes is a
        // pseudo-mode for adding sources only.
        while running.load(Ordering::SeqCst) {
            let result = unsafe {
                CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, Duration::from_millis(100), true)
            };
            if result == core_foundation::runloop::CFRunLoopRunResult::Stopped {
                break;
            }
        }

        unsafe {
            current_run_loop.remove_source(&loop_source, kCFRunLoopCommonModes);
        }
        active.store(false, Ordering::SeqCst);
        crate::diag::log("event tap removed");
        return;
    }
}

/// The full per-click pipeline. Returns the decision so the callback knows
/// whether to consume the event; the deferred work is already on its way
/// to the UI thread by the time this returns.
fn handle_click(ctx: &TapContext, x: f64, y: f64) -> Decision {
    let target = target::resolve(x, y);

    // The exemption store is locked per membership test only; the slow
    // Accessibility queries must not run under it.
    let exemptions = SharedExemptions::new(Arc::clone(&ctx.exemptions));
    let decision = orchestrator::decide(
        target.as_ref(),
        ctx.own_pid,
        &RunningAppResolver,
        &exemptions,
        &AxWindowCensus,
    );

    match &decision {
        Decision::PassThrough => {}
        Decision::DeferTerminate(app) => {
            crate::diag::log(&format!(
                "close on last window of {}; scheduling terminate",
                app.bundle_id
            ));
            let _ = ctx.actions.send(Scheduled::after(
                Action::Terminate { app: app.clone() },
                TERMINATE_DELAY,
            ));
        }
        Decision::Prompt(app) => {
            crate::diag::log(&format!(
                "close with multiple windows on {}; prompting",
                app.bundle_id
            ));
            let _ = ctx
                .actions
                .send(Scheduled::now(Action::Prompt { app: app.clone() }));
        }
    }

    decision
}
