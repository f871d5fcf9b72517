use chrono::{NaiveDate, Utc};
use diesel::{dsl, ExpressionMethods, QueryDsl, RunQueryDsl};

use crate::db::{self, user_profile, DaoError, DbThreadPool};
use crate::models::budget::Budget;
use crate::models::expense::{Expense, NewExpense};
use crate::models::goal::Goal;
use crate::request_io::InputExpense;
use crate::schema::budgets::dsl::budgets;
use crate::schema::expenses as expense_fields;
use crate::schema::expenses::dsl::expenses;
use crate::schema::goals::dsl::goals;
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

    /// Validates ownership of any linked budget/goal inside the write
    /// transaction, so a rejected expense leaves no row behind. The expense
    /// date defaults to `today` when the input has none.
    pub fn create_expense(
        &self,
        user_id: i32,
        expense: &InputExpense,
        today: NaiveDate,
    ) -> Result<Expense, DaoError> {
        validators::validate_amount_cents(expense.amount_cents)?;

        let mut db_connection = self.db_thread_pool.get()?;

        let created_expense = db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let linked_budget = match expense.budget_id {
                    Some(budget_id) => Some(budgets.find(budget_id).first::<Budget>(conn)?),
                    None => None,
                };

                let linked_goal = match expense.goal_id {
                    Some(goal_id) => Some(goals.find(goal_id).first::<Goal>(conn)?),
                    None => None,
                };

                let scope = user_profile::family_scope_for_user(conn, user_id)?;
                validators::validate_expense_links(
                    user_id,
                    linked_budget.as_ref(),
                    linked_goal.as_ref(),
                    scope,
                )?;

                let new_expense = NewExpense {
                    user_id,
                    amount_cents: expense.amount_cents,
                    description: &expense.description,
                    date: expense.date.unwrap_or(today),
                    budget_id: expense.budget_id,
                    goal_id: expense.goal_id,
                    created_timestamp: Utc::now().naive_utc(),
                };

                Ok(dsl::insert_into(expenses)
                    .values(&new_expense)
                    .get_result::<Expense>(conn)?)
            })?;

        Ok(created_expense)
    }

    pub fn get_expenses_for_user(&self, user_id: i32) -> Result<Vec<Expense>, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        Ok(expenses
            .filter(expense_fields::user_id.eq(user_id))
            .order(expense_fields::date.desc())
            .load::<Expense>(&mut db_connection)?)
    }

    pub fn get_recent_expenses(&self, user_id: i32, count: i64) -> Result<Vec<Expense>, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        Ok(expenses
            .filter(expense_fields::user_id.eq(user_id))
            .order(expense_fields::created_timestamp.desc())
            .limit(count)
            .load::<Expense>(&mut db_connection)?)
    }

    /// Sum of the user's expenses dated within the given calendar month.
    /// Zero when no rows match.
    pub fn monthly_expense_total(
        &self,
        user_id: i32,
        year: i32,
        month: u32,
    ) -> Result<i64, DaoError> {
        let (window_start, window_end) = db::month_bounds(year, month)?;

        let mut db_connection = self.db_thread_pool.get()?;

        let amounts = expenses
            .select(expense_fields::amount_cents)
            .filter(expense_fields::user_id.eq(user_id))
            .filter(expense_fields::date.ge(window_start))
            .filter(expense_fields::date.lt(window_end))
            .load::<i64>(&mut db_connection)?;

        Ok(amounts.iter().sum())
    }

    pub fn delete_expense(&self, user_id: i32, expense_id: i32) -> Result<(), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        let affected_row_count = dsl::delete(
            expenses
                .find(expense_id)
                .filter(expense_fields::user_id.eq(user_id)),
        )
        .execute(&mut db_connection)?;

        if affected_row_count == 0 {
            return Err(diesel::result::Error::NotFound.into());
        }

        Ok(())
    }
}
