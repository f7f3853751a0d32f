use ticker_common::QuoteKind;

/// What the status line shows on the current step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplaySlot<'a> {
    Quote(QuoteKind),
    /// Once per cycle; `None` keeps whatever the status already shows
    StaticFallback(Option<&'a str>),
}

/// Cycles through a fixed list of quote slots followed by one fallback slot.
///
/// The cursor only moves through `advance`, so a caller that fails to present
/// the current slot simply does not call it and the same slot comes up again.
#[derive(Debug, Clone)]
pub struct RotationScheduler {
    slots: Vec<QuoteKind>,
    fallback: Option<String>,
    /// Always in `0..=slots.len()`; `slots.len()` is the fallback position
    cursor: usize,
}

impl RotationScheduler {
    pub fn new(slots: Vec<QuoteKind>, fallback: Option<String>) -> Self {
        Self {
            slots,
            fallback,
            cursor: 0,
        }
    }

    pub fn current(&self) -> DisplaySlot<'_> {
        match self.slots.get(self.cursor) {
            Some(kind) => DisplaySlot::Quote(*kind),
            None => DisplaySlot::StaticFallback(self.fallback.as_deref()),
        }
    }

    /// Moves to the next slot, wrapping to 0 after the fallback
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.cycle_len();
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of steps in a full cycle, fallback included
    pub fn cycle_len(&self) -> usize {
        self.slots.len() + 1
    }
}
