/// Horizontal drag distance, in pixels, that commits a swipe
pub const SWIPE_THRESHOLD: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDecision {
    Like,
    Pass,
}

/// Cursor and drag state over a list of recommendation cards
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwipeDeck {
    index: usize,
    drag_offset: f64,
    dragging: bool,
}

impl SwipeDeck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn drag_offset(&self) -> f64 {
        self.drag_offset
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn current<'a, T>(&self, cards: &'a [T]) -> Option<&'a T> {
        cards.get(self.index)
    }

    /// The card peeking out behind the current one
    pub fn next<'a, T>(&self, cards: &'a [T]) -> Option<&'a T> {
        cards.get(self.index + 1)
    }

    pub fn begin_drag(&mut self) {
        self.dragging = true;
    }

    pub fn drag_to(&mut self, offset: f64) {
        self.drag_offset = offset;
    }

    /// End the drag. Past the threshold a decision is returned (right is a
    /// like, left a pass); otherwise the card snaps back.
    pub fn release(&mut self) -> Option<SwipeDecision> {
        self.dragging = false;
        if self.drag_offset.abs() > SWIPE_THRESHOLD {
            if self.drag_offset > 0.0 {
                Some(SwipeDecision::Like)
            } else {
                Some(SwipeDecision::Pass)
            }
        } else {
            self.drag_offset = 0.0;
            None
        }
    }

    /// Finish a decision. When the decided card was removed from the list the
    /// next card has shifted under the cursor, so the index stays put.
    pub fn complete(&mut self, removed_from_list: bool) {
        if !removed_from_list {
            self.index += 1;
        }
        self.drag_offset = 0.0;
        self.dragging = false;
    }

    pub fn cancel(&mut self) {
        self.drag_offset = 0.0;
        self.dragging = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn card_opacity(&self) -> f64 {
        (1.0 - self.drag_offset.abs() / 300.0).max(0.7)
    }

    pub fn card_rotation_deg(&self) -> f64 {
        self.drag_offset * 0.1
    }

    /// True once the cursor has moved past the end of a non-empty list
    pub fn is_exhausted(&self, len: usize) -> bool {
        len > 0 && self.index >= len
    }

    /// 1-based position label, e.g. `2 / 5`
    pub fn position_label(&self, len: usize) -> String {
        format!("{} / {}", (self.index + 1).min(len.max(1)), len)
    }
}
