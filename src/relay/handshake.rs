//! Per-viewer signaling handshake state machine
//!
//! Tracks how far a viewer has progressed through the offer/answer
//! exchange. The hub advances this as it observes relay traffic; the
//! terminal `Connected` state is reached on the streamer side, where
//! [`AnswerLatch`] guards the "apply only the first answer" rule.

use serde::Serialize;

/// Viewer-side handshake progression
///
/// `Idle → ReadySent → OfferReceived → AnswerSent → Connected`, in order.
/// Out-of-order events leave the state unchanged: the relay forwards
/// them anyway and any failure surfaces in the peer's media stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerHandshake {
    #[default]
    Idle,
    ReadySent,
    OfferReceived,
    AnswerSent,
    Connected,
}

impl ViewerHandshake {
    /// Viewer announced readiness. Valid only from `Idle`.
    pub fn ready_sent(&mut self) -> bool {
        self.advance(Self::Idle, Self::ReadySent)
    }

    /// An offer broadcast reached this viewer.
    pub fn offer_received(&mut self) -> bool {
        self.advance(Self::ReadySent, Self::OfferReceived)
    }

    /// Viewer emitted its answer.
    pub fn answer_sent(&mut self) -> bool {
        self.advance(Self::OfferReceived, Self::AnswerSent)
    }

    /// The streamer applied this viewer's answer. Terminal.
    pub fn connected(&mut self) -> bool {
        self.advance(Self::AnswerSent, Self::Connected)
    }

    fn advance(&mut self, from: Self, to: Self) -> bool {
        if *self == from {
            *self = to;
            true
        } else {
            false
        }
    }

    pub fn is_connected(&self) -> bool {
        *self == Self::Connected
    }
}

impl std::fmt::Display for ViewerHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::ReadySent => write!(f, "ready_sent"),
            Self::OfferReceived => write!(f, "offer_received"),
            Self::AnswerSent => write!(f, "answer_sent"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// First-answer-wins guard for the streamer endpoint
///
/// A streamer maintains a single peer connection per offer, so only the
/// first answer may be applied as the remote description; later answers
/// from other viewers must be discarded rather than clobbering it.
#[derive(Debug, Default)]
pub struct AnswerLatch {
    applied: bool,
}

impl AnswerLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` exactly once; every later call returns `false`.
    pub fn try_apply(&mut self) -> bool {
        if self.applied {
            false
        } else {
            self.applied = true;
            true
        }
    }

    /// Re-arm the latch for a fresh offer (new peer connection).
    pub fn reset(&mut self) {
        self.applied = false;
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut hs = ViewerHandshake::default();
        assert_eq!(hs, ViewerHandshake::Idle);
        assert!(hs.ready_sent());
        assert!(hs.offer_received());
        assert!(hs.answer_sent());
        assert!(hs.connected());
        assert!(hs.is_connected());
    }

    #[test]
    fn test_out_of_order_events_ignored() {
        let mut hs = ViewerHandshake::default();
        // Answer before offer: no transition
        assert!(!hs.answer_sent());
        assert_eq!(hs, ViewerHandshake::Idle);

        assert!(hs.ready_sent());
        // Duplicate ready: no transition
        assert!(!hs.ready_sent());
        assert_eq!(hs, ViewerHandshake::ReadySent);
    }

    #[test]
    fn test_connected_is_terminal() {
        let mut hs = ViewerHandshake::Connected;
        assert!(!hs.ready_sent());
        assert!(!hs.offer_received());
        assert!(!hs.answer_sent());
        assert!(!hs.connected());
        assert!(hs.is_connected());
    }

    #[test]
    fn test_latch_applies_exactly_once() {
        let mut latch = AnswerLatch::new();
        // Two viewers answer concurrently; only the first is applied
        let mut applied = 0;
        for _ in 0..2 {
            if latch.try_apply() {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        assert!(latch.is_applied());
    }

    #[test]
    fn test_latch_reset_rearms() {
        let mut latch = AnswerLatch::new();
        assert!(latch.try_apply());
        assert!(!latch.try_apply());
        latch.reset();
        assert!(latch.try_apply());
    }
}
