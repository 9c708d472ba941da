//! Per-stream deduplication watermark.

/// Timestamp of the most recently dispatched entry in one log stream.
///
/// Held in process memory only: a restart re-observes whatever the source
/// still returns, so notifications are at-least-once across restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermark(Option<i64>);

impl Watermark {
    /// A watermark that has not seen any entry yet.
    pub const fn unset() -> Self {
        Self(None)
    }

    pub const fn at(timestamp: i64) -> Self {
        Self(Some(timestamp))
    }

    pub fn get(&self) -> Option<i64> {
        self.0
    }

    /// Whether an entry with this timestamp has not been dispatched yet.
    pub fn admits(&self, timestamp: i64) -> bool {
        match self.0 {
            Some(mark) => timestamp > mark,
            None => true,
        }
    }

    /// Advance to `timestamp`. Never moves backwards.
    pub fn advance(&mut self, timestamp: i64) {
        self.0 = Some(self.0.map_or(timestamp, |mark| mark.max(timestamp)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_admits_everything() {
        let mark = Watermark::unset();
        assert!(mark.admits(0));
        assert!(mark.admits(-5));
    }

    #[test]
    fn admits_only_strictly_newer() {
        let mark = Watermark::at(100);
        assert!(!mark.admits(99));
        assert!(!mark.admits(100));
        assert!(mark.admits(101));
    }

    #[test]
    fn advance_is_monotonic() {
        let mut mark = Watermark::at(100);
        mark.advance(50);
        assert_eq!(mark.get(), Some(100));
        mark.advance(105);
        assert_eq!(mark.get(), Some(105));
    }

    #[test]
    fn zero_timestamp_sets_a_real_mark() {
        let mut mark = Watermark::unset();
        mark.advance(0);
        assert_eq!(mark.get(), Some(0));
        assert!(!mark.admits(0));
    }
}
