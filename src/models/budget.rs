use chrono::NaiveDateTime;
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};

use crate::schema::budgets;

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = budgets)]
pub struct Budget {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub amount_cents: i64,
    pub category: String,
    pub is_family: bool,
    pub family_id: Option<i32>,
    pub created_timestamp: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = budgets)]
pub struct NewBudget<'a> {
    pub user_id: i32,
    pub name: &'a str,
    pub amount_cents: i64,
    pub category: &'a str,
    pub is_family: bool,
    pub family_id: Option<i32>,
    pub created_timestamp: NaiveDateTime,
}
