use chrono::NaiveDateTime;
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};

use crate::schema::goals;

/// Saving goals accumulate progress from contributions; spending goals from
/// linked expenses. Stored as an `Int2` column.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalType {
    Saving,
    Spending,
}

impl GoalType {
    pub fn as_i16(self) -> i16 {
        match self {
            GoalType::Saving => 0,
            GoalType::Spending => 1,
        }
    }

    pub fn from_i16(value: i16) -> Option<GoalType> {
        match value {
            0 => Some(GoalType::Saving),
            1 => Some(GoalType::Spending),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = goals)]
pub struct Goal {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub amount_cents: i64,
    pub goal_type: i16,
    pub is_personal: bool,
    pub family_id: Option<i32>,
    pub pinned: bool,
    pub created_timestamp: NaiveDateTime,
}

impl Goal {
    pub fn goal_type(&self) -> Option<GoalType> {
        GoalType::from_i16(self.goal_type)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = goals)]
pub struct NewGoal<'a> {
    pub user_id: i32,
    pub name: &'a str,
    pub amount_cents: i64,
    pub goal_type: i16,
    pub is_personal: bool,
    pub family_id: Option<i32>,
    pub pinned: bool,
    pub created_timestamp: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_type_i16_round_trip() {
        assert_eq!(GoalType::from_i16(GoalType::Saving.as_i16()), Some(GoalType::Saving));
        assert_eq!(
            GoalType::from_i16(GoalType::Spending.as_i16()),
            Some(GoalType::Spending)
        );
        assert_eq!(GoalType::from_i16(2), None);
        assert_eq!(GoalType::from_i16(-1), None);
    }
}
