use fixgate_core::LogIndex;

/// A one-shot latch carrying the final stream position a component must
/// reach before shutdown completes (§3). Set exactly once; polling
/// before it is set returns `None` rather than blocking, in keeping with
/// the no-suspension-points rule (§5) — there is no agent thread free to
/// block on.
#[derive(Debug, Default)]
pub struct CompletionPosition {
    position: Option<LogIndex>,
}

impl CompletionPosition {
    pub fn new() -> CompletionPosition {
        CompletionPosition { position: None }
    }

    /// # Panics
    /// If called more than once: a completion position is set exactly
    /// once per shutdown.
    pub fn set(&mut self, position: LogIndex) {
        assert!(self.position.is_none(), "CompletionPosition set twice");
        self.position = Some(position);
    }

    pub fn get(&self) -> Option<LogIndex> {
        self.position
    }

    pub fn is_reached(&self, observed_position: LogIndex) -> bool {
        self.position.is_some_and(|target| observed_position >= target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_latch_reports_not_reached() {
        let latch = CompletionPosition::new();
        assert!(!latch.is_reached(1000));
    }

    #[test]
    fn reports_reached_once_position_passes_target() {
        let mut latch = CompletionPosition::new();
        latch.set(42);
        assert!(!latch.is_reached(41));
        assert!(latch.is_reached(42));
        assert!(latch.is_reached(100));
    }

    #[test]
    #[should_panic(expected = "set twice")]
    fn cannot_be_set_twice() {
        let mut latch = CompletionPosition::new();
        latch.set(1);
        latch.set(2);
    }
}
