use chrono::NaiveDateTime;
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};

use crate::schema::user_profiles;

/// Per-user financial profile. `monthly_income_cents` is zero only while the
/// profile is uninitialized; once set it is at least one cent.
#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = user_profiles)]
pub struct UserProfile {
    pub id: i32,
    pub user_id: i32,
    pub family_id: Option<i32>,
    pub monthly_income_cents: i64,
    pub created_timestamp: NaiveDateTime,
    pub modified_timestamp: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_profiles)]
pub struct NewUserProfile {
    pub user_id: i32,
    pub family_id: Option<i32>,
    pub monthly_income_cents: i64,
    pub created_timestamp: NaiveDateTime,
    pub modified_timestamp: NaiveDateTime,
}
