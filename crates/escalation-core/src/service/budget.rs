//! Weekly card budgets.
//!
//! A participant's available budget is the league's weekly budget times the
//! current league week, recomputed whenever the budget is read. Adds and
//! removals respect the post-cutoff lock window.

use escalation_types::activity::{NewActivity, actions};
use escalation_types::budget::{
    AddCardRequest, Budget, BudgetCard, BudgetCardId, BudgetId, BudgetSummary, BudgetView,
    UpdateBudgetRequest, UpdateCardRequest, summarize_weeks,
};
use escalation_types::config::CalendarConfig;
use escalation_types::error::{BudgetError, RepositoryError};
use escalation_types::league::{League, LeagueId};
use escalation_types::money::Money;
use escalation_types::user::UserId;
use serde_json::json;

use crate::calendar::LeagueCalendar;
use crate::repository::activity::ActivityLogRepository;
use crate::repository::budget::BudgetRepository;
use crate::repository::league::LeagueRepository;
use crate::service::activity::ActivityService;
use crate::service::{Clock, system_clock};

fn storage(e: RepositoryError) -> BudgetError {
    BudgetError::StorageError(e.to_string())
}

/// Who is touching a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetAccess {
    /// Only the caller's own budgets.
    Owner(UserId),
    /// Any budget in any league.
    Admin,
}

impl BudgetAccess {
    fn permits(self, budget: &Budget) -> bool {
        match self {
            BudgetAccess::Owner(user_id) => budget.user_id == user_id,
            BudgetAccess::Admin => true,
        }
    }
}

fn validate_card(card: &AddCardRequest) -> Result<(), BudgetError> {
    if card.card_name.trim().is_empty() {
        return Err(BudgetError::Validation("card name is required".to_string()));
    }
    if card.quantity <= 0 {
        return Err(BudgetError::Validation(
            "quantity must be greater than zero".to_string(),
        ));
    }
    if !card.price.is_positive() {
        return Err(BudgetError::Validation(
            "price must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

pub struct BudgetService<B: BudgetRepository, L: LeagueRepository, A: ActivityLogRepository> {
    repo: B,
    leagues: L,
    activity: ActivityService<A>,
    calendar: CalendarConfig,
    clock: Clock,
}

impl<B: BudgetRepository, L: LeagueRepository, A: ActivityLogRepository> BudgetService<B, L, A> {
    pub fn new(repo: B, leagues: L, activity: ActivityService<A>, calendar: CalendarConfig) -> Self {
        Self {
            repo,
            leagues,
            activity,
            calendar,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    async fn league(&self, id: LeagueId) -> Result<League, BudgetError> {
        self.leagues
            .get(id)
            .await
            .map_err(storage)?
            .ok_or(BudgetError::LeagueNotFound)
    }

    fn calendar(&self, league: &League) -> Result<LeagueCalendar, BudgetError> {
        Ok(LeagueCalendar::for_league(league, &self.calendar)?)
    }

    /// Persist `weekly_budget * current_week` when it has drifted.
    async fn refresh(&self, budget: Budget, league: &League, current_week: u32) -> Result<Budget, BudgetError> {
        let available = league.weekly_budget.times(i64::from(current_week));
        if budget.budget_available == available {
            return Ok(budget);
        }
        tracing::debug!(budget_id = %budget.id, week = current_week, %available, "refreshing available budget");
        self.repo
            .set_totals(budget.id, budget.budget_used, available)
            .await
            .map_err(storage)
    }

    async fn view(&self, budget: Budget, league: &League) -> Result<BudgetView, BudgetError> {
        let calendar = self.calendar(league)?;
        let now = (self.clock)();
        let current_week = calendar.current_week(now);
        let budget = self.refresh(budget, league, current_week).await?;
        let total_cards = self.repo.count_cards(budget.id).await.map_err(storage)?;
        Ok(BudgetView {
            remaining: budget.remaining(),
            budget,
            total_cards,
            weekly_budget: league.weekly_budget,
            current_week,
            max_week: calendar.max_week(),
            adds_locked: calendar.adds_locked(now),
        })
    }

    /// Load a budget and check the caller may touch it.
    async fn accessible(&self, access: BudgetAccess, id: BudgetId) -> Result<(Budget, League), BudgetError> {
        let budget = self
            .repo
            .get(id)
            .await
            .map_err(storage)?
            .ok_or(BudgetError::NotFound)?;
        if !access.permits(&budget) {
            return Err(BudgetError::Forbidden);
        }
        let league = self.league(budget.league_id).await?;
        Ok((budget, league))
    }

    /// Open a budget for a league participant.
    pub async fn create_budget(&self, user_id: UserId, league_id: LeagueId) -> Result<BudgetView, BudgetError> {
        let league = self.league(league_id).await?;
        let enrolled = self
            .leagues
            .get_enrollment(user_id, league_id)
            .await
            .map_err(storage)?;
        if enrolled.is_none() {
            return Err(BudgetError::NotEnrolled);
        }

        let week = self.calendar(&league)?.current_week((self.clock)());
        let available = league.weekly_budget.times(i64::from(week));
        let budget = self
            .repo
            .create(user_id, league_id, available)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => BudgetError::AlreadyExists,
                other => storage(other),
            })?;

        self.activity
            .log(NewActivity::new(user_id, actions::BUDGET_CREATED).with_metadata(json!({
                "budget_id": budget.id,
                "league_id": league_id,
            })))
            .await;
        self.view(budget, &league).await
    }

    /// The caller's budget in a league.
    pub async fn get_budget(&self, user_id: UserId, league_id: LeagueId) -> Result<BudgetView, BudgetError> {
        let league = self.league(league_id).await?;
        let budget = self
            .repo
            .get_for(user_id, league_id)
            .await
            .map_err(storage)?
            .ok_or(BudgetError::NotFound)?;
        self.view(budget, &league).await
    }

    pub async fn get_budget_by_id(&self, access: BudgetAccess, id: BudgetId) -> Result<BudgetView, BudgetError> {
        let (budget, league) = self.accessible(access, id).await?;
        self.view(budget, &league).await
    }

    /// Admin adjustment of the stored totals.
    pub async fn update_budget(
        &self,
        actor: UserId,
        id: BudgetId,
        request: UpdateBudgetRequest,
    ) -> Result<Budget, BudgetError> {
        let (budget, _) = self.accessible(BudgetAccess::Admin, id).await?;
        if request.budget_used.is_none() && request.budget_available.is_none() {
            return Err(BudgetError::Validation(
                "provide budget_used or budget_available".to_string(),
            ));
        }
        let used = request.budget_used.unwrap_or(budget.budget_used);
        let available = request.budget_available.unwrap_or(budget.budget_available);
        if used.is_negative() || available.is_negative() {
            return Err(BudgetError::Validation(
                "budget amounts cannot be negative".to_string(),
            ));
        }

        let updated = self
            .repo
            .set_totals(id, used, available)
            .await
            .map_err(storage)?;
        self.activity
            .log(NewActivity::new(actor, actions::BUDGET_ADJUSTED).with_metadata(json!({
                "budget_id": id,
                "previous_used": budget.budget_used,
                "previous_available": budget.budget_available,
                "budget_used": used,
                "budget_available": available,
            })))
            .await;
        Ok(updated)
    }

    pub async fn list_cards(&self, access: BudgetAccess, id: BudgetId) -> Result<Vec<BudgetCard>, BudgetError> {
        self.accessible(access, id).await?;
        self.repo.list_cards(id).await.map_err(storage)
    }

    pub async fn add_card(
        &self,
        user_id: UserId,
        id: BudgetId,
        mut card: AddCardRequest,
    ) -> Result<BudgetCard, BudgetError> {
        validate_card(&card)?;
        card.card_name = card.card_name.trim().to_string();

        let (budget, league) = self.accessible(BudgetAccess::Owner(user_id), id).await?;
        let calendar = self.calendar(&league)?;
        let now = (self.clock)();
        let current_week = calendar.current_week(now);
        if calendar.adds_locked(now) {
            return Err(BudgetError::Locked { current_week });
        }

        let budget = self.refresh(budget, &league, current_week).await?;
        let required = card.price.times(card.quantity);
        if required > budget.remaining() {
            return Err(BudgetError::InsufficientBudget {
                remaining: budget.remaining(),
                required,
            });
        }

        let added = self
            .repo
            .add_card(id, &card, current_week)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => BudgetError::InsufficientBudget {
                    remaining: budget.remaining(),
                    required,
                },
                other => storage(other),
            })?;

        self.activity
            .log(NewActivity::new(user_id, actions::CARD_ADDED).with_metadata(json!({
                "budget_id": id,
                "card_name": added.card_name,
                "quantity": added.quantity,
                "price": added.price_at_addition,
                "week": current_week,
            })))
            .await;
        Ok(added)
    }

    /// Change a card's quantity or notes; `budget_used` moves by the cost delta.
    pub async fn update_card(
        &self,
        user_id: UserId,
        id: BudgetId,
        card_id: BudgetCardId,
        request: UpdateCardRequest,
    ) -> Result<BudgetCard, BudgetError> {
        if matches!(request.quantity, Some(q) if q <= 0) {
            return Err(BudgetError::Validation(
                "quantity must be greater than zero".to_string(),
            ));
        }
        let (budget, league) = self.accessible(BudgetAccess::Owner(user_id), id).await?;
        let card = self
            .repo
            .get_card(id, card_id)
            .await
            .map_err(storage)?
            .ok_or(BudgetError::CardNotFound)?;

        let quantity = request.quantity.unwrap_or(card.quantity);
        let cost_delta = card.price_at_addition.times(quantity - card.quantity);
        let budget = if cost_delta.is_positive() {
            let week = self.calendar(&league)?.current_week((self.clock)());
            let budget = self.refresh(budget, &league, week).await?;
            if cost_delta > budget.remaining() {
                return Err(BudgetError::InsufficientBudget {
                    remaining: budget.remaining(),
                    required: cost_delta,
                });
            }
            budget
        } else {
            budget
        };

        let notes = request.notes.as_deref().or(card.notes.as_deref());
        let updated = self
            .repo
            .update_card(id, card_id, quantity, notes, cost_delta)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => BudgetError::CardNotFound,
                RepositoryError::Conflict(_) => BudgetError::InsufficientBudget {
                    remaining: budget.remaining(),
                    required: cost_delta,
                },
                other => storage(other),
            })?;

        self.activity
            .log(NewActivity::new(user_id, actions::CARD_UPDATED).with_metadata(json!({
                "budget_id": id,
                "card_id": card_id,
                "quantity": quantity,
                "cost_delta": cost_delta,
            })))
            .await;
        Ok(updated)
    }

    /// Delete a card and refund its cost.
    pub async fn remove_card(&self, user_id: UserId, id: BudgetId, card_id: BudgetCardId) -> Result<Money, BudgetError> {
        let (_, league) = self.accessible(BudgetAccess::Owner(user_id), id).await?;
        let calendar = self.calendar(&league)?;
        let now = (self.clock)();
        if calendar.adds_locked(now) {
            return Err(BudgetError::Locked {
                current_week: calendar.current_week(now),
            });
        }

        let card = self
            .repo
            .get_card(id, card_id)
            .await
            .map_err(storage)?
            .ok_or(BudgetError::CardNotFound)?;
        self.repo.remove_card(id, card_id).await.map_err(|e| match e {
            RepositoryError::NotFound => BudgetError::CardNotFound,
            other => storage(other),
        })?;

        let refund = card.cost();
        self.activity
            .log(NewActivity::new(user_id, actions::CARD_REMOVED).with_metadata(json!({
                "budget_id": id,
                "card_name": card.card_name,
                "refund": refund,
            })))
            .await;
        Ok(refund)
    }

    /// Per-week spend with rollover.
    pub async fn summary(&self, access: BudgetAccess, id: BudgetId) -> Result<BudgetSummary, BudgetError> {
        let (budget, league) = self.accessible(access, id).await?;
        let calendar = self.calendar(&league)?;
        let now = (self.clock)();
        let current_week = calendar.current_week(now);
        let budget = self.refresh(budget, &league, current_week).await?;
        let spend = self.repo.weekly_spend(id).await.map_err(storage)?;

        let weeks = summarize_weeks(league.weekly_budget, current_week, &spend);
        let total_spent: Money = spend.iter().map(|s| s.spent).sum();
        Ok(BudgetSummary {
            budget_id: budget.id,
            league_id: league.id,
            weekly_budget: league.weekly_budget,
            current_week,
            max_week: calendar.max_week(),
            adds_locked: calendar.adds_locked(now),
            total_available: budget.budget_available,
            total_spent,
            remaining: budget.remaining(),
            weeks,
        })
    }
}
