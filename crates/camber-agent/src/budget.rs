//! Bounded retry budgets for the automatic repair loops

/// Maximum automatic regenerations after compile failures
pub const COMPILE_RETRY_LIMIT: u32 = 3;

/// Maximum automatic regenerations after failed visual checks
pub const VERIFY_RETRY_LIMIT: u32 = 2;

/// Tracks how many automatic repairs the current request has consumed.
/// Compile and verification repairs are budgeted independently.
///
/// Exhaustion is checked before consuming, so the failure that finds the
/// counter at the limit is the one reported as giving up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryBudget {
    compile_retries: u32,
    verify_retries: u32,
}

impl RetryBudget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile_exhausted(&self) -> bool {
        self.compile_retries >= COMPILE_RETRY_LIMIT
    }

    pub fn consume_compile_retry(&mut self) {
        self.compile_retries += 1;
    }

    pub fn compile_retries(&self) -> u32 {
        self.compile_retries
    }

    pub fn verify_exhausted(&self) -> bool {
        self.verify_retries >= VERIFY_RETRY_LIMIT
    }

    pub fn consume_verify_retry(&mut self) {
        self.verify_retries += 1;
    }

    pub fn verify_retries(&self) -> u32 {
        self.verify_retries
    }

    /// Fresh compile budget, granted on success and on new intents
    pub fn reset_compile(&mut self) {
        self.compile_retries = 0;
    }

    /// Fresh verification budget, granted on a passing verdict
    pub fn reset_verify(&mut self) {
        self.verify_retries = 0;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_budget_is_not_exhausted() {
        let budget = RetryBudget::new();
        assert!(!budget.compile_exhausted());
        assert!(!budget.verify_exhausted());
    }

    #[test]
    fn compile_budget_exhausts_after_three() {
        let mut budget = RetryBudget::new();
        for _ in 0..3 {
            assert!(!budget.compile_exhausted());
            budget.consume_compile_retry();
        }
        assert!(budget.compile_exhausted());
    }

    #[test]
    fn verify_budget_exhausts_after_two() {
        let mut budget = RetryBudget::new();
        budget.consume_verify_retry();
        assert!(!budget.verify_exhausted());
        budget.consume_verify_retry();
        assert!(budget.verify_exhausted());
    }

    #[test]
    fn budgets_are_independent() {
        let mut budget = RetryBudget::new();
        budget.consume_compile_retry();
        budget.consume_compile_retry();
        budget.consume_compile_retry();
        assert!(budget.compile_exhausted());
        assert!(!budget.verify_exhausted());
        budget.reset_compile();
        assert!(!budget.compile_exhausted());
    }

    #[test]
    fn reset_clears_both_counters() {
        let mut budget = RetryBudget::new();
        budget.consume_compile_retry();
        budget.consume_verify_retry();
        budget.reset();
        assert_eq!(budget, RetryBudget::new());
    }
}
