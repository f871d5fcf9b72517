use chrono::Utc;
use diesel::{dsl, ExpressionMethods, QueryDsl, RunQueryDsl};

use crate::db::{self, user_profile, DaoError, DbThreadPool};
use crate::models::budget::{Budget, NewBudget};
use crate::request_io::{InputBudget, OutputBudgetStatus};
use crate::schema::budgets as budget_fields;
use crate::schema::budgets::dsl::budgets;
use crate::schema::expenses as expense_fields;
use crate::schema::expenses::dsl::expenses;
use crate::validators;

pub struct Dao {
    db_thread_pool: DbThreadPool,
}

impl Dao {
    pub fn new(db_thread_pool: &DbThreadPool) -> Self {
        Self {
            db_thread_pool: db_thread_pool.clone(),
        }
    }

    pub fn create_budget(&self, user_id: i32, budget: &InputBudget) -> Result<Budget, DaoError> {
        validators::validate_amount_cents(budget.amount_cents)?;

        let mut db_connection = self.db_thread_pool.get()?;

        let created_budget = db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let scope = user_profile::family_scope_for_user(conn, user_id)?;
                validators::validate_budget_scope(budget.is_family, budget.family_id, scope)?;

                let new_budget = NewBudget {
                    user_id,
                    name: &budget.name,
                    amount_cents: budget.amount_cents,
                    category: &budget.category,
                    is_family: budget.is_family,
                    family_id: if budget.is_family {
                        budget.family_id
                    } else {
                        None
                    },
                    created_timestamp: Utc::now().naive_utc(),
                };

                Ok(dsl::insert_into(budgets)
                    .values(&new_budget)
                    .get_result::<Budget>(conn)?)
            })?;

        Ok(created_budget)
    }

    pub fn get_budgets_for_user(&self, user_id: i32) -> Result<Vec<Budget>, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        Ok(budgets
            .filter(budget_fields::user_id.eq(user_id))
            .order(budget_fields::created_timestamp.desc())
            .load::<Budget>(&mut db_connection)?)
    }

    /// Usage of a budget's allocation for one calendar month, recomputed from
    /// the linked expense rows on every call. `remaining_cents` goes negative
    /// when the budget is overspent; that is a reportable state, not an
    /// error.
    pub fn get_budget_status(
        &self,
        budget_id: i32,
        year: i32,
        month: u32,
    ) -> Result<OutputBudgetStatus, DaoError> {
        let (window_start, window_end) = db::month_bounds(year, month)?;

        let mut db_connection = self.db_thread_pool.get()?;

        let budget = budgets
            .find(budget_id)
            .first::<Budget>(&mut db_connection)?;

        let expense_amounts = expenses
            .select(expense_fields::amount_cents)
            .filter(expense_fields::budget_id.eq(budget.id))
            .filter(expense_fields::date.ge(window_start))
            .filter(expense_fields::date.lt(window_end))
            .load::<i64>(&mut db_connection)?;

        let used_cents: i64 = expense_amounts.iter().sum();

        Ok(OutputBudgetStatus {
            budget_id: budget.id,
            used_cents,
            remaining_cents: budget.amount_cents - used_cents,
            percentage: db::percentage_of_cents(used_cents, budget.amount_cents),
        })
    }

    /// Sum of the user's budget allocations created within the given month.
    pub fn monthly_budget_total(
        &self,
        user_id: i32,
        year: i32,
        month: u32,
    ) -> Result<i64, DaoError> {
        let (window_start, window_end) = db::month_bounds(year, month)?;

        let mut db_connection = self.db_thread_pool.get()?;

        let amounts = budgets
            .select(budget_fields::amount_cents)
            .filter(budget_fields::user_id.eq(user_id))
            .filter(
                budget_fields::created_timestamp
                    .ge(window_start.and_time(chrono::NaiveTime::MIN)),
            )
            .filter(budget_fields::created_timestamp.lt(window_end.and_time(chrono::NaiveTime::MIN)))
            .load::<i64>(&mut db_connection)?;

        Ok(amounts.iter().sum())
    }

    /// Deletes a budget and detaches its expenses (they survive with no
    /// budget link).
    pub fn delete_budget(&self, user_id: i32, budget_id: i32) -> Result<(), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                dsl::update(expenses.filter(expense_fields::budget_id.eq(budget_id)))
                    .set(expense_fields::budget_id.eq(None::<i32>))
                    .execute(conn)?;

                let affected_row_count = dsl::delete(
                    budgets
                        .find(budget_id)
                        .filter(budget_fields::user_id.eq(user_id)),
                )
                .execute(conn)?;

                if affected_row_count == 0 {
                    return Err(diesel::result::Error::NotFound);
                }

                Ok(())
            })?;

        Ok(())
    }
}
