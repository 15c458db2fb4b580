//! Budget repository trait definition.

use escalation_types::budget::{
    AddCardRequest, Budget, BudgetCard, BudgetCardId, BudgetId, WeekSpend,
};
use escalation_types::error::RepositoryError;
use escalation_types::league::LeagueId;
use escalation_types::money::Money;
use escalation_types::user::UserId;

/// Repository trait for budgets and their card purchases.
pub trait BudgetRepository: Send + Sync {
    /// Returns `Conflict` when the user already has a budget in the league.
    fn create(
        &self,
        user_id: UserId,
        league_id: LeagueId,
        available: Money,
    ) -> impl std::future::Future<Output = Result<Budget, RepositoryError>> + Send;

    fn get(
        &self,
        id: BudgetId,
    ) -> impl std::future::Future<Output = Result<Option<Budget>, RepositoryError>> + Send;

    fn get_for(
        &self,
        user_id: UserId,
        league_id: LeagueId,
    ) -> impl std::future::Future<Output = Result<Option<Budget>, RepositoryError>> + Send;

    /// Overwrite the stored totals.
    fn set_totals(
        &self,
        id: BudgetId,
        used: Money,
        available: Money,
    ) -> impl std::future::Future<Output = Result<Budget, RepositoryError>> + Send;

    /// Sum of card quantities recorded against the budget.
    fn count_cards(
        &self,
        id: BudgetId,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;

    /// Cards, newest first.
    fn list_cards(
        &self,
        id: BudgetId,
    ) -> impl std::future::Future<Output = Result<Vec<BudgetCard>, RepositoryError>> + Send;

    fn get_card(
        &self,
        budget_id: BudgetId,
        card_id: BudgetCardId,
    ) -> impl std::future::Future<Output = Result<Option<BudgetCard>, RepositoryError>> + Send;

    /// Insert a card and charge its cost in one transaction.
    ///
    /// Returns `Conflict` when the cost exceeds the remaining budget at the
    /// time of the write.
    fn add_card(
        &self,
        budget_id: BudgetId,
        card: &AddCardRequest,
        week: u32,
    ) -> impl std::future::Future<Output = Result<BudgetCard, RepositoryError>> + Send;

    /// Change a card's quantity/notes and move `budget_used` by `cost_delta`.
    ///
    /// Returns `Conflict` when a positive delta exceeds the remaining budget.
    fn update_card(
        &self,
        budget_id: BudgetId,
        card_id: BudgetCardId,
        quantity: i64,
        notes: Option<&str>,
        cost_delta: Money,
    ) -> impl std::future::Future<Output = Result<BudgetCard, RepositoryError>> + Send;

    /// Delete a card and refund its cost.
    fn remove_card(
        &self,
        budget_id: BudgetId,
        card_id: BudgetCardId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Spend aggregated by week added.
    fn weekly_spend(
        &self,
        id: BudgetId,
    ) -> impl std::future::Future<Output = Result<Vec<WeekSpend>, RepositoryError>> + Send;
}
