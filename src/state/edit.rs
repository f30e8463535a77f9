//! Caption edit sessions
//!
//! Live-typed caption text is applied to the grid as the user types but
//! recorded in history only once, when the session commits. A session
//! remembers the caption it started from so it can be cancelled.

use std::time::{Duration, Instant};

use super::caption::{Caption, CaptionSlot};
use super::geometry::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionEdit {
    pos: Position,
    slot: CaptionSlot,
    original: Option<Caption>,
    started_at: Instant,
    last_input: Instant,
    updates: usize,
}

impl CaptionEdit {
    pub fn begin(pos: Position, slot: CaptionSlot, original: Option<Caption>, now: Instant) -> Self {
        Self {
            pos,
            slot,
            original,
            started_at: now,
            last_input: now,
            updates: 0,
        }
    }

    pub fn pos(&self) -> Position {
        self.pos
    }

    pub fn slot(&self) -> CaptionSlot {
        self.slot
    }

    /// Caption before the session started
    pub fn original(&self) -> Option<&Caption> {
        self.original.as_ref()
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Note a keystroke
    pub fn touch(&mut self, now: Instant) {
        self.last_input = now;
        self.updates += 1;
    }

    pub fn updates(&self) -> usize {
        self.updates
    }

    /// No input for at least `timeout`
    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_input) >= timeout
    }

    /// Whether `current` differs from where the session started
    pub fn changed(&self, current: Option<&Caption>) -> bool {
        self.original.as_ref() != current
    }
}
