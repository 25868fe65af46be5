//! Deferred-action queue for the UI thread.
//!
//! The tap callback must never block, so everything that acts on another
//! application (termination, the prompt, keystroke synthesis) is sent over
//! a channel and executed here, off the input path. Scheduled actions are
//! not cancellable; instead each one is revalidated against the live
//! process right before firing, so a relaunch reusing the pid within the
//! delay window cannot be hit by a stale action.

#[cfg(target_os = "macos")]
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use super::AppRef;

/// Delay before terminating a single-window application, letting the
/// window close through its normal path first.
pub const TERMINATE_DELAY: Duration = Duration::from_millis(300);

/// Delay between activating the target application and synthesizing the
/// close shortcut, so the keystroke lands in the right app.
pub const KEYSTROKE_SETTLE_DELAY: Duration = Duration::from_millis(100);

#[cfg(target_os = "macos")]
const IDLE_TICK: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Present the multi-window choice for an application.
    Prompt { app: AppRef },
    /// Terminate the application, after revalidation.
    Terminate { app: AppRef },
    /// Synthesize the standard close-window shortcut at the application,
    /// after revalidation.
    CloseKeystroke { app: AppRef },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduled {
    pub action: Action,
    pub due: Instant,
}

impl Scheduled {
    pub fn now(action: Action) -> Self {
        Self {
            action,
            due: Instant::now(),
        }
    }

    pub fn after(action: Action, delay: Duration) -> Self {
        Self {
            action,
            due: Instant::now() + delay,
        }
    }
}

/// Due-time ordered set of pending actions. Small enough that a plain
/// vector with linear scans beats anything fancier.
pub struct PendingQueue {
    items: Vec<Scheduled>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, scheduled: Scheduled) {
        self.items.push(scheduled);
    }

    /// Earliest due time among pending actions, if any.
    pub fn next_due(&self) -> Option<Instant> {
        self.items.iter().map(|s| s.due).min()
    }

    /// Remove and return the earliest action whose due time has passed.
    pub fn pop_due(&mut self, now: Instant) -> Option<Action> {
        let idx = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, s)| s.due <= now)
            .min_by_key(|(_, s)| s.due)
            .map(|(i, _)| i)?;
        Some(self.items.remove(idx).action)
    }

    /// Like `pop_due`, but skips prompts. Used to flush due work before a
    /// modal prompt blocks the loop.
    pub fn pop_due_non_prompt(&mut self, now: Instant) -> Option<Action> {
        let idx = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, s)| s.due <= now && !matches!(s.action, Action::Prompt { .. }))
            .min_by_key(|(_, s)| s.due)
            .map(|(i, _)| i)?;
        Some(self.items.remove(idx).action)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Gate applied to every deferred action right before it fires: the target
/// process must still be alive and must still be the application captured
/// at scheduling time.
pub fn should_still_fire(expected: &AppRef, current: Option<&AppRef>) -> bool {
    match current {
        Some(current) => current.pid == expected.pid && current.bundle_id == expected.bundle_id,
        None => false,
    }
}

/// UI-thread loop: drain the channel, fire actions as they come due.
/// Returns when the sending side (the tap) is gone.
#[cfg(target_os = "macos")]
pub fn run(actions: Receiver<Scheduled>) {
    let mut queue = PendingQueue::new();
    loop {
        let timeout = queue
            .next_due()
            .map(|due| due.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_TICK);
        match actions.recv_timeout(timeout) {
            Ok(scheduled) => queue.push(scheduled),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        while let Some(action) = queue.pop_due(Instant::now()) {
            fire(action, &mut queue);
        }
    }
}

#[cfg(target_os = "macos")]
fn fire(action: Action, queue: &mut PendingQueue) {
    use super::prompt::{self, PromptChoice};
    use super::target;

    match action {
        Action::Terminate { app } => {
            if !revalidate(&app) {
                return;
            }
            crate::diag::log(&format!(
                "terminating {} (pid {}) after deferred close",
                app.bundle_id, app.pid
            ));
            if !target::terminate_app(app.pid) {
                crate::diag::log(&format!(
                    "terminate request refused by {} (pid {})",
                    app.bundle_id, app.pid
                ));
            }
        }
        Action::Prompt { app } => {
            // The modal blocks this loop, so anything already due must not
            // wait behind it. Actions coming due while the modal is up fire
            // on dismissal, gated by the same revalidation as always.
            while let Some(due) = queue.pop_due_non_prompt(Instant::now()) {
                fire(due, queue);
            }
            match prompt::present_choice(&app) {
                PromptChoice::QuitApp => {
                    // Hide first so the windows do not visibly linger while
                    // the process tears down.
                    target::hide_app(app.pid);
                    if !target::terminate_app(app.pid) {
                        crate::diag::log(&format!(
                            "terminate request refused by {} (pid {})",
                            app.bundle_id, app.pid
                        ));
                    }
                }
                PromptChoice::CloseWindowOnly => {
                    // The original click was consumed, so the intent has to
                    // be re-synthesized once the target has focus again.
                    target::activate_app(app.pid);
                    queue.push(Scheduled::after(
                        Action::CloseKeystroke { app },
                        KEYSTROKE_SETTLE_DELAY,
                    ));
                }
                PromptChoice::Cancel => {}
            }
        }
        Action::CloseKeystroke { app } => {
            if !revalidate(&app) {
                return;
            }
            if let Err(err) = prompt::synthesize_close_keystroke() {
                crate::diag::log(&format!(
                    "close keystroke for {} failed: {err}",
                    app.bundle_id
                ));
            }
        }
    }
}

#[cfg(target_os = "macos")]
fn revalidate(expected: &AppRef) -> bool {
    let current = super::target::resolve_app(expected.pid);
    let ok = should_still_fire(expected, current.as_ref());
    if !ok {
        crate::diag::log(&format!(
            "dropping stale action for {} (pid {})",
            expected.bundle_id, expected.pid
        ));
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(pid: i32, bundle_id: &str) -> AppRef {
        AppRef {
            pid,
            bundle_id: bundle_id.to_string(),
            name: "Example".to_string(),
        }
    }

    #[test]
    fn pop_due_respects_due_times() {
        let mut queue = PendingQueue::new();
        let now = Instant::now();
        queue.push(Scheduled {
            action: Action::Terminate {
                app: app(1, "com.example.A"),
            },
            due: now + Duration::from_millis(300),
        });

        assert!(queue.pop_due(now).is_none());
        assert_eq!(queue.len(), 1);

        let later = now + Duration::from_millis(301);
        let popped = queue.pop_due(later).expect("due action");
        assert!(matches!(popped, Action::Terminate { .. }));
        assert!(queue.is_empty());
    }

    #[test]
    fn pop_due_returns_earliest_first() {
        let mut queue = PendingQueue::new();
        let now = Instant::now();
        queue.push(Scheduled {
            action: Action::Terminate {
                app: app(2, "com.example.B"),
            },
            due: now + Duration::from_millis(20),
        });
        queue.push(Scheduled {
            action: Action::Prompt {
                app: app(1, "com.example.A"),
            },
            due: now,
        });

        let later = now + Duration::from_millis(30);
        let first = queue.pop_due(later).expect("first");
        assert!(matches!(first, Action::Prompt { .. }));
        let second = queue.pop_due(later).expect("second");
        assert!(matches!(second, Action::Terminate { .. }));
    }

    #[test]
    fn due_work_is_flushed_around_a_pending_prompt() {
        // A termination due alongside a prompt must not wait for the modal
        // to be dismissed.
        let mut queue = PendingQueue::new();
        let now = Instant::now();
        queue.push(Scheduled {
            action: Action::Prompt {
                app: app(1, "com.example.A"),
            },
            due: now,
        });
        queue.push(Scheduled {
            action: Action::Terminate {
                app: app(2, "com.example.B"),
            },
            due: now,
        });

        let flushed = queue.pop_due_non_prompt(now).expect("due non-prompt");
        assert!(matches!(flushed, Action::Terminate { .. }));
        // Nothing else due besides the prompt itself.
        assert!(queue.pop_due_non_prompt(now).is_none());
        assert_eq!(queue.len(), 1);
        assert!(matches!(
            queue.pop_due(now).expect("prompt still queued"),
            Action::Prompt { .. }
        ));
    }

    #[test]
    fn next_due_is_minimum() {
        let mut queue = PendingQueue::new();
        assert!(queue.next_due().is_none());

        let now = Instant::now();
        queue.push(Scheduled {
            action: Action::Prompt {
                app: app(1, "com.example.A"),
            },
            due: now + Duration::from_millis(50),
        });
        queue.push(Scheduled {
            action: Action::Prompt {
                app: app(2, "com.example.B"),
            },
            due: now + Duration::from_millis(10),
        });
        assert_eq!(queue.next_due(), Some(now + Duration::from_millis(10)));
    }

    #[test]
    fn fires_when_pid_and_bundle_id_match() {
        let expected = app(42, "com.example.App");
        let current = app(42, "com.example.App");
        assert!(should_still_fire(&expected, Some(&current)));
    }

    #[test]
    fn does_not_fire_when_process_is_gone() {
        let expected = app(42, "com.example.App");
        assert!(!should_still_fire(&expected, None));
    }

    #[test]
    fn does_not_fire_when_pid_was_reused_by_another_app() {
        let expected = app(42, "com.example.App");
        let current = app(42, "com.other.App");
        assert!(!should_still_fire(&expected, Some(&current)));
    }

    #[test]
    fn scheduled_after_sets_future_due_time() {
        let before = Instant::now();
        let scheduled = Scheduled::after(
            Action::Terminate {
                app: app(1, "com.example.A"),
            },
            TERMINATE_DELAY,
        );
        assert!(scheduled.due >= before + TERMINATE_DELAY);
    }
}
