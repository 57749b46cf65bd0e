//! Order lifecycle state machine.
//!
//! Pure transition rules over [`OrderStatus`]; the order service applies them
//! and stamps the matching timestamps. `completed` and `cancelled` are
//! terminal.

use crate::entities::order::OrderStatus;

/// Statuses reachable from `from` in a single step.
pub fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match from {
        Pending => &[Confirmed, Cancelled],
        Confirmed => &[Preparing, Cancelled],
        Preparing => &[Ready, Cancelled],
        Ready => &[Completed, Cancelled],
        Completed => &[],
        Cancelled => &[],
    }
}

/// Whether `from -> to` is a legal single-step transition.
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Terminal statuses have no outgoing transitions.
pub fn is_terminal(status: OrderStatus) -> bool {
    allowed_transitions(status).is_empty()
}

/// Which statuses the customer-facing cancel operation accepts.
///
/// The transition table permits ready -> cancelled, but the cancel endpoint
/// historically stopped at preparing; the gap is a policy switch rather than a
/// hard-coded rule.
#[derive(Debug, Clone, Copy)]
pub struct CancelPolicy {
    pub allow_from_ready: bool,
}

impl Default for CancelPolicy {
    fn default() -> Self {
        Self {
            allow_from_ready: false,
        }
    }
}

impl CancelPolicy {
    pub fn permits(&self, status: OrderStatus) -> bool {
        use OrderStatus::*;
        match status {
            Pending | Confirmed | Preparing => true,
            Ready => self.allow_from_ready,
            Completed | Cancelled => false,
        }
    }
}
