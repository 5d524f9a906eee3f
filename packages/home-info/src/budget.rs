//! Per-request credit budget.

use serde::Serialize;

use crate::traits::client::CallKind;

/// Default number of credits one request may spend.
pub const DEFAULT_CREDIT_LIMIT: u32 = 10;

/// Credit counter owned by a single request.
///
/// Callers check [`can_afford`](Self::can_afford) with the client's
/// worst-case cost before a call and [`charge`](Self::charge) the reported
/// cost after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditBudget {
    limit: u32,
    search: u32,
    extract: u32,
}

/// Usage band of a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    LowUsage,
    ModerateUsage,
    NearLimit,
    OverLimit,
}

/// Snapshot of a budget for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetReport {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub search: u32,
    pub extract: u32,
    pub status: BudgetStatus,
}

impl Default for CreditBudget {
    fn default() -> Self {
        Self::new(DEFAULT_CREDIT_LIMIT)
    }
}

impl CreditBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            search: 0,
            extract: 0,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn used(&self) -> u32 {
        self.search.saturating_add(self.extract)
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used())
    }

    /// Whether spending `cost` more keeps usage within the limit.
    pub fn can_afford(&self, cost: u32) -> bool {
        self.used().saturating_add(cost) <= self.limit
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Record credits a call actually consumed.
    ///
    /// The charge is recorded even if it overshoots the limit, since the
    /// provider has already billed it.
    pub fn charge(&mut self, kind: CallKind, credits: u32) {
        match kind {
            CallKind::Search => self.search = self.search.saturating_add(credits),
            CallKind::Extract => self.extract = self.extract.saturating_add(credits),
        }
    }

    pub fn spent_on(&self, kind: CallKind) -> u32 {
        match kind {
            CallKind::Search => self.search,
            CallKind::Extract => self.extract,
        }
    }

    /// Usage as a percentage of the limit.
    pub fn usage_percentage(&self) -> f64 {
        if self.limit == 0 {
            0.0
        } else {
            self.used() as f64 / self.limit as f64 * 100.0
        }
    }

    pub fn status(&self) -> BudgetStatus {
        let pct = self.usage_percentage();
        if self.used() > self.limit {
            BudgetStatus::OverLimit
        } else if pct >= 80.0 {
            BudgetStatus::NearLimit
        } else if pct > 50.0 {
            BudgetStatus::ModerateUsage
        } else {
            BudgetStatus::LowUsage
        }
    }

    pub fn report(&self) -> BudgetReport {
        BudgetReport {
            used: self.used(),
            limit: self.limit,
            remaining: self.remaining(),
            search: self.search,
            extract: self.extract,
            status: self.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_afford_is_inclusive_of_limit() {
        let mut budget = CreditBudget::new(10);
        budget.charge(CallKind::Search, 3);
        budget.charge(CallKind::Extract, 5);
        assert!(budget.can_afford(2));
        assert!(!budget.can_afford(3));
        assert_eq!(budget.remaining(), 2);
        assert_eq!(budget.status(), BudgetStatus::NearLimit);
    }

    #[test]
    fn test_overshoot_is_recorded() {
        let mut budget = CreditBudget::new(2);
        budget.charge(CallKind::Extract, 3);
        assert_eq!(budget.used(), 3);
        assert_eq!(budget.remaining(), 0);
        assert!(budget.is_exhausted());
        assert_eq!(budget.status(), BudgetStatus::OverLimit);
    }

    #[test]
    fn test_report_breakdown() {
        let mut budget = CreditBudget::default();
        budget.charge(CallKind::Search, 1);
        budget.charge(CallKind::Extract, 2);
        let report = budget.report();
        assert_eq!((report.search, report.extract, report.used), (1, 2, 3));
        assert_eq!(report.status, BudgetStatus::LowUsage);
    }
}
