//! SQLite budget repository implementation.

use escalation_core::repository::budget::BudgetRepository;
use escalation_types::budget::{AddCardRequest, Budget, BudgetCard, BudgetCardId, BudgetId, WeekSpend};
use escalation_types::error::RepositoryError;
use escalation_types::league::LeagueId;
use escalation_types::money::Money;
use escalation_types::user::UserId;
use sqlx::{Row, SqliteConnection};

use super::pool::DatabasePool;
use super::{is_unique_violation, now, parse_datetime, query_err};

const SELECT_BUDGET: &str =
    "SELECT id, user_id, league_id, budget_used, budget_available, created_at, updated_at FROM budgets";

const SELECT_CARD: &str = "SELECT id, budget_id, card_name, set_name, quantity, price_at_addition,
        week_added, notes, created_at
 FROM budget_cards";

/// SQLite-backed implementation of `BudgetRepository`.
#[derive(Clone)]
pub struct SqliteBudgetRepository {
    pool: DatabasePool,
}

impl SqliteBudgetRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct BudgetRow {
    id: i64,
    user_id: i64,
    league_id: i64,
    budget_used: i64,
    budget_available: i64,
    created_at: String,
    updated_at: String,
}

impl BudgetRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            league_id: row.try_get("league_id")?,
            budget_used: row.try_get("budget_used")?,
            budget_available: row.try_get("budget_available")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_budget(self) -> Result<Budget, RepositoryError> {
        Ok(Budget {
            id: BudgetId(self.id),
            user_id: UserId(self.user_id),
            league_id: LeagueId(self.league_id),
            budget_used: Money::from_cents(self.budget_used),
            budget_available: Money::from_cents(self.budget_available),
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct CardRow {
    id: i64,
    budget_id: i64,
    card_name: String,
    set_name: Option<String>,
    quantity: i64,
    price_at_addition: i64,
    week_added: i64,
    notes: Option<String>,
    created_at: String,
}

impl CardRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            budget_id: row.try_get("budget_id")?,
            card_name: row.try_get("card_name")?,
            set_name: row.try_get("set_name")?,
            quantity: row.try_get("quantity")?,
            price_at_addition: row.try_get("price_at_addition")?,
            week_added: row.try_get("week_added")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_card(self) -> Result<BudgetCard, RepositoryError> {
        Ok(BudgetCard {
            id: BudgetCardId(self.id),
            budget_id: BudgetId(self.budget_id),
            card_name: self.card_name,
            set_name: self.set_name,
            quantity: self.quantity,
            price_at_addition: Money::from_cents(self.price_at_addition),
            week_added: u32::try_from(self.week_added)
                .map_err(|_| RepositoryError::Query(format!("invalid week_added {}", self.week_added)))?,
            notes: self.notes,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn map_budget(row: &sqlx::sqlite::SqliteRow) -> Result<Budget, RepositoryError> {
    BudgetRow::from_row(row).map_err(query_err)?.into_budget()
}

fn map_card(row: &sqlx::sqlite::SqliteRow) -> Result<BudgetCard, RepositoryError> {
    CardRow::from_row(row).map_err(query_err)?.into_card()
}

async fn fetch_card(
    conn: &mut SqliteConnection,
    budget_id: BudgetId,
    card_id: BudgetCardId,
) -> Result<Option<BudgetCard>, RepositoryError> {
    let row = sqlx::query(&format!("{SELECT_CARD} WHERE id = ? AND budget_id = ?"))
        .bind(card_id.get())
        .bind(budget_id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(query_err)?;
    row.as_ref().map(map_card).transpose()
}

/// Move `budget_used` by `delta`. A positive delta only applies while it
/// fits in the remaining budget.
async fn charge(conn: &mut SqliteConnection, budget_id: BudgetId, delta: Money) -> Result<(), RepositoryError> {
    let done = sqlx::query(
        "UPDATE budgets SET budget_used = budget_used + ?, updated_at = ?
         WHERE id = ? AND (? <= 0 OR budget_available - budget_used >= ?)",
    )
    .bind(delta.cents())
    .bind(now())
    .bind(budget_id.get())
    .bind(delta.cents())
    .bind(delta.cents())
    .execute(&mut *conn)
    .await
    .map_err(query_err)?;

    if done.rows_affected() > 0 {
        return Ok(());
    }
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM budgets WHERE id = ?")
        .bind(budget_id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(query_err)?;
    match exists {
        Some(_) => Err(RepositoryError::Conflict(format!(
            "charge of {delta} exceeds remaining budget"
        ))),
        None => Err(RepositoryError::NotFound),
    }
}

impl SqliteBudgetRepository {
    async fn reload(&self, id: BudgetId) -> Result<Budget, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_BUDGET} WHERE id = ?"))
            .bind(id.get())
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(query_err)?
            .ok_or(RepositoryError::NotFound)?;
        map_budget(&row)
    }
}

impl BudgetRepository for SqliteBudgetRepository {
    async fn create(&self, user_id: UserId, league_id: LeagueId, available: Money) -> Result<Budget, RepositoryError> {
        let ts = now();
        let result = sqlx::query(
            "INSERT INTO budgets (user_id, league_id, budget_used, budget_available, created_at, updated_at)
             VALUES (?, ?, 0, ?, ?, ?)",
        )
        .bind(user_id.get())
        .bind(league_id.get())
        .bind(available.cents())
        .bind(&ts)
        .bind(&ts)
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(done) => self.reload(BudgetId(done.last_insert_rowid())).await,
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::Conflict(format!(
                "user {user_id} already has a budget in league {league_id}"
            ))),
            Err(e) => Err(query_err(e)),
        }
    }

    async fn get(&self, id: BudgetId) -> Result<Option<Budget>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_BUDGET} WHERE id = ?"))
            .bind(id.get())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_budget).transpose()
    }

    async fn get_for(&self, user_id: UserId, league_id: LeagueId) -> Result<Option<Budget>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_BUDGET} WHERE user_id = ? AND league_id = ?"))
            .bind(user_id.get())
            .bind(league_id.get())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_budget).transpose()
    }

    async fn set_totals(&self, id: BudgetId, used: Money, available: Money) -> Result<Budget, RepositoryError> {
        let done = sqlx::query(
            "UPDATE budgets SET budget_used = ?, budget_available = ?, updated_at = ? WHERE id = ?",
        )
        .bind(used.cents())
        .bind(available.cents())
        .bind(now())
        .bind(id.get())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;
        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.reload(id).await
    }

    async fn count_cards(&self, id: BudgetId) -> Result<i64, RepositoryError> {
        sqlx::query_scalar("SELECT COALESCE(SUM(quantity), 0) FROM budget_cards WHERE budget_id = ?")
            .bind(id.get())
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_err)
    }

    async fn list_cards(&self, id: BudgetId) -> Result<Vec<BudgetCard>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_CARD} WHERE budget_id = ? ORDER BY created_at DESC, id DESC"))
            .bind(id.get())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;
        rows.iter().map(map_card).collect()
    }

    async fn get_card(&self, budget_id: BudgetId, card_id: BudgetCardId) -> Result<Option<BudgetCard>, RepositoryError> {
        let mut conn = self.pool.reader.acquire().await.map_err(query_err)?;
        fetch_card(&mut conn, budget_id, card_id).await
    }

    async fn add_card(&self, budget_id: BudgetId, card: &AddCardRequest, week: u32) -> Result<BudgetCard, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        charge(&mut tx, budget_id, card.price.times(card.quantity)).await?;

        let done = sqlx::query(
            "INSERT INTO budget_cards (budget_id, card_name, set_name, quantity, price_at_addition,
                                       week_added, notes, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(budget_id.get())
        .bind(&card.card_name)
        .bind(&card.set_name)
        .bind(card.quantity)
        .bind(card.price.cents())
        .bind(i64::from(week))
        .bind(&card.notes)
        .bind(now())
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        let card_id = BudgetCardId(done.last_insert_rowid());
        let card = fetch_card(&mut tx, budget_id, card_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await.map_err(query_err)?;
        Ok(card)
    }

    async fn update_card(
        &self,
        budget_id: BudgetId,
        card_id: BudgetCardId,
        quantity: i64,
        notes: Option<&str>,
        cost_delta: Money,
    ) -> Result<BudgetCard, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let done = sqlx::query(
            "UPDATE budget_cards SET quantity = ?, notes = COALESCE(?, notes) WHERE id = ? AND budget_id = ?",
        )
        .bind(quantity)
        .bind(notes)
        .bind(card_id.get())
        .bind(budget_id.get())
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;
        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        if cost_delta != Money::ZERO {
            charge(&mut tx, budget_id, cost_delta).await?;
        }

        let card = fetch_card(&mut tx, budget_id, card_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await.map_err(query_err)?;
        Ok(card)
    }

    async fn remove_card(&self, budget_id: BudgetId, card_id: BudgetCardId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let card = fetch_card(&mut tx, budget_id, card_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        sqlx::query("DELETE FROM budget_cards WHERE id = ?")
            .bind(card_id.get())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        charge(&mut tx, budget_id, -card.cost()).await?;
        tx.commit().await.map_err(query_err)
    }

    async fn weekly_spend(&self, id: BudgetId) -> Result<Vec<WeekSpend>, RepositoryError> {
        let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
            "SELECT week_added, SUM(quantity * price_at_addition), SUM(quantity)
             FROM budget_cards WHERE budget_id = ?
             GROUP BY week_added ORDER BY week_added",
        )
        .bind(id.get())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.into_iter()
            .map(|(week, spent, cards_added)| {
                Ok(WeekSpend {
                    week: u32::try_from(week)
                        .map_err(|_| RepositoryError::Query(format!("invalid week_added {week}")))?,
                    spent: Money::from_cents(spent),
                    cards_added,
                })
            })
            .collect()
    }
}
