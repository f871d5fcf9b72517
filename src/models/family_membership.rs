use chrono::NaiveDateTime;
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};

use crate::models::family::Family;
use crate::schema::family_memberships;

/// One row per family member. This table is the single source of truth for
/// membership; `user_profiles.family_id` is a cache derived from it.
#[derive(Clone, Debug, Serialize, Deserialize, Associations, Identifiable, Queryable)]
#[diesel(belongs_to(Family, foreign_key = family_id))]
#[diesel(table_name = family_memberships)]
pub struct FamilyMembership {
    pub id: i32,
    pub family_id: i32,
    pub user_id: i32,
    pub created_timestamp: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = family_memberships)]
pub struct NewFamilyMembership {
    pub family_id: i32,
    pub user_id: i32,
    pub created_timestamp: NaiveDateTime,
}
