use chrono::{NaiveDate, NaiveDateTime};
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};

use crate::models::goal::Goal;
use crate::schema::contributions;

#[derive(Clone, Debug, Serialize, Deserialize, Associations, Identifiable, Queryable)]
#[diesel(belongs_to(Goal, foreign_key = goal_id))]
#[diesel(table_name = contributions)]
pub struct Contribution {
    pub id: i32,
    pub user_id: i32,
    pub goal_id: i32,
    pub amount_cents: i64,
    pub date: NaiveDate,
    pub created_timestamp: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = contributions)]
pub struct NewContribution {
    pub user_id: i32,
    pub goal_id: i32,
    pub amount_cents: i64,
    pub date: NaiveDate,
    pub created_timestamp: NaiveDateTime,
}
