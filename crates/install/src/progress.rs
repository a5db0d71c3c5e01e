//! Percent progress reporting.

/// Callback invoked synchronously with a percentage in `0..=100`.
pub type ProgressCallback<'a> = &'a mut dyn FnMut(u8);

/// Maps completed steps onto a percent range and drops repeated values.
///
/// Step `i` of `total` reports `base + i * budget / total`. A value is only
/// emitted when it is larger than the last one, so the caller sees a
/// strictly increasing sequence.
#[derive(Debug, Clone)]
pub struct PercentTicker {
    base: u8,
    budget: u8,
    total: usize,
    last: Option<u8>,
}

impl PercentTicker {
    /// Creates a ticker covering `base..=base + budget` over `total` steps.
    ///
    /// `base + budget` is clamped to 100.
    pub fn new(base: u8, budget: u8, total: usize) -> Self {
        let base = base.min(100);
        Self {
            base,
            budget: budget.min(100 - base),
            total,
            last: None,
        }
    }

    /// Percent value for `done` completed steps.
    pub fn percent(&self, done: usize) -> u8 {
        if self.total == 0 {
            return self.base + self.budget;
        }
        let done = done.min(self.total) as u64;
        let scaled = done * u64::from(self.budget) / self.total as u64;
        // `scaled <= budget`, so the sum stays within `u8`.
        self.base + scaled as u8
    }

    /// Reports `done` completed steps, emitting only on change.
    pub fn advance(&mut self, done: usize, emit: &mut dyn FnMut(u8)) {
        let value = self.percent(done);
        if self.last.is_none_or(|last| value > last) {
            self.last = Some(value);
            emit(value);
        }
    }

    /// Reports the end of the range.
    pub fn finish(&mut self, emit: &mut dyn FnMut(u8)) {
        self.advance(self.total, emit);
    }

    /// Last emitted value.
    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(ticker: &mut PercentTicker, steps: impl IntoIterator<Item = usize>) -> Vec<u8> {
        let mut seen = Vec::new();
        for step in steps {
            ticker.advance(step, &mut |p| seen.push(p));
        }
        ticker.finish(&mut |p| seen.push(p));
        seen
    }

    #[test]
    fn suppresses_duplicates_for_many_steps() {
        let mut ticker = PercentTicker::new(0, 100, 1000);
        let seen = collect(&mut ticker, 1..=1000);
        // 0 is reported after the first step, then each percent once.
        assert_eq!(seen.len(), 101);
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn few_steps_jump() {
        let mut ticker = PercentTicker::new(0, 100, 3);
        assert_eq!(collect(&mut ticker, 1..=3), vec![33, 66, 100]);
    }

    #[test]
    fn base_and_budget_offset_the_range() {
        let mut ticker = PercentTicker::new(50, 50, 2);
        assert_eq!(collect(&mut ticker, 1..=2), vec![75, 100]);
    }

    #[test]
    fn empty_total_finishes_at_end_of_range() {
        let mut ticker = PercentTicker::new(0, 100, 0);
        assert_eq!(collect(&mut ticker, Vec::new()), vec![100]);
    }

    #[test]
    fn budget_is_clamped() {
        let ticker = PercentTicker::new(80, 90, 1);
        assert_eq!(ticker.percent(1), 100);
    }
}
