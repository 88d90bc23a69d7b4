//! Result cursor states.

/// Where a [`ResultCursor`](crate::ResultCursor) stands in its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorState {
    /// No result set has been looked at yet.
    Uninitialized,
    /// The current result set has rows in the cache or on the wire.
    HasRows,
    /// The current set is drained; more sets follow.
    ExhaustedHasMoreSets,
    /// Nothing is left in the reply.
    ExhaustedDone,
}

impl CursorState {
    /// Whether rows can still be read from the current set.
    #[must_use]
    pub fn has_rows(self) -> bool {
        self == Self::HasRows
    }

    /// Whether the whole reply has been consumed.
    #[must_use]
    pub fn is_done(self) -> bool {
        self == Self::ExhaustedDone
    }
}
