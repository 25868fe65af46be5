//! Per-click decision engine.
//!
//! Runs synchronously inside the tap callback and maps a resolved click
//! target to one of three outcomes: let the event through, let it through
//! and schedule a termination, or consume it and prompt. The checks run in
//! a fixed order; the self-protection check is absolute and comes before
//! everything that could act on the application.

use super::{AppRef, ClickTarget};

/// Membership test against the persisted exemption set.
pub trait ExemptionOracle {
    fn contains(&self, bundle_id: &str) -> bool;
}

/// Live top-level window count for an application. Implementations must
/// return 1 when the count cannot be determined.
pub trait WindowCounter {
    fn count_windows(&self, pid: i32) -> usize;
}

/// Resolves a pid to a positively identified running application.
pub trait AppResolver {
    fn resolve_app(&self, pid: i32) -> Option<AppRef>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Deliver the original event unmodified and do nothing else.
    PassThrough,
    /// Deliver the original event and schedule a termination of the
    /// application after the close animation has had time to finish.
    DeferTerminate(AppRef),
    /// Consume the original event and ask the user what to do.
    Prompt(AppRef),
}

impl Decision {
    /// Only the multi-window prompt withholds the original event.
    pub fn consumes_event(&self) -> bool {
        matches!(self, Decision::Prompt(_))
    }
}

pub fn decide(
    target: Option<&ClickTarget>,
    own_pid: i32,
    resolver: &dyn AppResolver,
    exemptions: &dyn ExemptionOracle,
    census: &dyn WindowCounter,
) -> Decision {
    let Some(target) = target else {
        return Decision::PassThrough;
    };
    if !target.is_close_control() {
        return Decision::PassThrough;
    }
    // Never act on our own process, regardless of anything below.
    if target.pid == own_pid {
        return Decision::PassThrough;
    }
    let Some(app) = resolver.resolve_app(target.pid) else {
        // No positive identity, no intervention.
        return Decision::PassThrough;
    };
    if exemptions.contains(&app.bundle_id) {
        return Decision::PassThrough;
    }
    if census.count_windows(app.pid) > 1 {
        Decision::Prompt(app)
    } else {
        Decision::DeferTerminate(app)
    }
}
