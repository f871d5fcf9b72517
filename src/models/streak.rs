use chrono::NaiveDate;
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};

use crate::schema::streaks;

/// Consecutive-day activity counter. One row per user, created lazily on
/// first access.
#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = streaks)]
pub struct Streak {
    pub id: i32,
    pub user_id: i32,
    pub count: i32,
    pub last_updated: NaiveDate,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = streaks)]
pub struct NewStreak {
    pub user_id: i32,
    pub count: i32,
    pub last_updated: NaiveDate,
}
