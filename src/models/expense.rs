use chrono::{NaiveDate, NaiveDateTime};
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};

use crate::models::budget::Budget;
use crate::models::goal::Goal;
use crate::schema::expenses;

#[derive(Clone, Debug, Serialize, Deserialize, Associations, Identifiable, Queryable)]
#[diesel(belongs_to(Budget, foreign_key = budget_id))]
#[diesel(belongs_to(Goal, foreign_key = goal_id))]
#[diesel(table_name = expenses)]
pub struct Expense {
    pub id: i32,
    pub user_id: i32,
    pub amount_cents: i64,
    pub description: String,
    pub date: NaiveDate,
    pub budget_id: Option<i32>,
    pub goal_id: Option<i32>,
    pub created_timestamp: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = expenses)]
pub struct NewExpense<'a> {
    pub user_id: i32,
    pub amount_cents: i64,
    pub description: &'a str,
    pub date: NaiveDate,
    pub budget_id: Option<i32>,
    pub goal_id: Option<i32>,
    pub created_timestamp: NaiveDateTime,
}
