//! The rotating frame slot index.

/// Which of the N per-frame resource sets is active.
///
/// Always in `0..count`. Advancing wraps, so slot `k` comes back every
/// `count` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSlot {
    index: usize,
    count: usize,
}

impl FrameSlot {
    /// Slot 0 of `count` slots. `count` must be non-zero.
    pub(crate) fn first(count: usize) -> Self {
        debug_assert!(count > 0, "frame slot count must be non-zero");
        Self { index: 0, count }
    }

    /// Every slot of a `count`-slot rotation, in order.
    pub(crate) fn all(count: usize) -> impl Iterator<Item = FrameSlot> {
        (0..count).map(move |index| FrameSlot { index, count })
    }

    #[inline]
    pub fn index(self) -> usize {
        self.index
    }

    #[inline]
    pub fn count(self) -> usize {
        self.count
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self {
            index: (self.index + 1) % self.count,
            count: self.count,
        }
    }
}

impl std::fmt::Display for FrameSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.index, self.count)
    }
}
