//! Weekly card budgets.
//!
//! Every league participant earns the league's weekly budget once per
//! league week. Cards bought are recorded against the week they were added.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::league::LeagueId;
use crate::money::Money;
use crate::user::UserId;

int_id!(
    /// Row id of a budget.
    BudgetId
);

int_id!(
    /// Row id of a card purchase recorded against a budget.
    BudgetCardId
);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: BudgetId,
    pub user_id: UserId,
    pub league_id: LeagueId,
    pub budget_used: Money,
    /// Total granted so far (`weekly_budget * current_week`).
    pub budget_available: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    pub fn remaining(&self) -> Money {
        self.budget_available - self.budget_used
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetCard {
    pub id: BudgetCardId,
    pub budget_id: BudgetId,
    pub card_name: String,
    pub set_name: Option<String>,
    pub quantity: i64,
    pub price_at_addition: Money,
    pub week_added: u32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BudgetCard {
    pub fn cost(&self) -> Money {
        self.price_at_addition.times(self.quantity)
    }
}

/// Request body for recording a card purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCardRequest {
    pub card_name: String,
    pub set_name: Option<String>,
    pub quantity: i64,
    pub price: Money,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCardRequest {
    pub quantity: Option<i64>,
    pub notes: Option<String>,
}

/// Admin adjustment of a budget's totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBudgetRequest {
    pub budget_used: Option<Money>,
    pub budget_available: Option<Money>,
}

/// A budget with its computed week position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetView {
    #[serde(flatten)]
    pub budget: Budget,
    pub remaining: Money,
    pub total_cards: i64,
    pub weekly_budget: Money,
    pub current_week: u32,
    pub max_week: u32,
    pub adds_locked: bool,
}

/// Spend recorded in one league week (aggregated from cards).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekSpend {
    pub week: u32,
    pub spent: Money,
    pub cards_added: i64,
}

/// One row of the budget summary with rollover applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekSummary {
    pub week: u32,
    /// Amount available at the start of the week, including rollover.
    pub budget_available: Money,
    pub spent: Money,
    pub remaining: Money,
    pub cards_added: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub budget_id: BudgetId,
    pub league_id: LeagueId,
    pub weekly_budget: Money,
    pub current_week: u32,
    pub max_week: u32,
    pub adds_locked: bool,
    pub total_available: Money,
    pub total_spent: Money,
    pub remaining: Money,
    pub weeks: Vec<WeekSummary>,
}

/// Build per-week rows `1..=current_week` with unspent budget rolling over.
///
/// `available(1) = weekly`, `available(n + 1) = available(n) - spent(n) + weekly`.
pub fn summarize_weeks(weekly_budget: Money, current_week: u32, spend: &[WeekSpend]) -> Vec<WeekSummary> {
    let mut rows = Vec::with_capacity(current_week as usize);
    let mut carried = Money::ZERO;
    for week in 1..=current_week {
        let (spent, cards_added) = spend
            .iter()
            .filter(|s| s.week == week)
            .fold((Money::ZERO, 0), |(m, c), s| (m + s.spent, c + s.cards_added));
        let available = carried + weekly_budget;
        let remaining = available - spent;
        rows.push(WeekSummary {
            week,
            budget_available: available,
            spent,
            remaining,
            cards_added,
        });
        carried = remaining;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spend(week: u32, cents: i64, cards: i64) -> WeekSpend {
        WeekSpend {
            week,
            spent: Money::from_cents(cents),
            cards_added: cards,
        }
    }

    #[test]
    fn test_summarize_weeks_rolls_over_unspent_budget() {
        let weekly = Money::from_cents(1000);
        let rows = summarize_weeks(weekly, 3, &[spend(1, 400, 2), spend(3, 1500, 1)]);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].budget_available.cents(), 1000);
        assert_eq!(rows[0].remaining.cents(), 600);
        assert_eq!(rows[1].budget_available.cents(), 1600);
        assert_eq!(rows[1].spent, Money::ZERO);
        assert_eq!(rows[2].budget_available.cents(), 2600);
        assert_eq!(rows[2].remaining.cents(), 1100);
        assert_eq!(rows[2].cards_added, 1);
    }

    #[test]
    fn test_summarize_weeks_ignores_future_weeks() {
        let rows = summarize_weeks(Money::from_cents(500), 1, &[spend(2, 100, 1)]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].spent, Money::ZERO);
    }

    #[test]
    fn test_card_cost_and_remaining() {
        let now = Utc::now();
        let card = BudgetCard {
            id: BudgetCardId(1),
            budget_id: BudgetId(1),
            card_name: "Sol Ring".into(),
            set_name: None,
            quantity: 3,
            price_at_addition: Money::from_cents(125),
            week_added: 1,
            notes: None,
            created_at: now,
        };
        assert_eq!(card.cost().cents(), 375);

        let budget = Budget {
            id: BudgetId(1),
            user_id: UserId(1),
            league_id: LeagueId(1),
            budget_used: Money::from_cents(375),
            budget_available: Money::from_cents(1000),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(budget.remaining().cents(), 625);
    }
}
