use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::goal::GoalType;

// All monetary fields are integer cents (two-fraction-digit decimals).

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputBudget {
    pub name: String,
    pub amount_cents: i64,
    pub category: String,
    pub is_family: bool,
    pub family_id: Option<i32>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputGoal {
    pub name: String,
    pub amount_cents: i64,
    pub goal_type: GoalType,
    pub is_personal: bool,
    pub family_id: Option<i32>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputExpense {
    pub amount_cents: i64,
    pub description: String,
    /// Defaults to the request date when omitted.
    pub date: Option<NaiveDate>,
    pub budget_id: Option<i32>,
    pub goal_id: Option<i32>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputContribution {
    pub goal_id: i32,
    pub amount_cents: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OutputBudgetStatus {
    pub budget_id: i32,
    pub used_cents: i64,
    pub remaining_cents: i64,
    pub percentage: f64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OutputGoalStatus {
    pub goal_id: i32,
    pub progress_cents: i64,
    pub percentage: f64,
    pub remaining_cents: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OutputFamilyFinancials {
    pub family_id: i32,
    pub income_cents: i64,
    pub expense_cents: i64,
    pub savings_cents: i64,
    pub year: i32,
    pub month: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OutputMonthlyStatus {
    pub monthly_expense_cents: i64,
    pub monthly_budget_cents: i64,
    pub monthly_income_cents: i64,
    pub remaining_cents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_type_serializes_lowercase() {
        let input = InputGoal {
            name: String::from("Vacation"),
            amount_cents: 100_000,
            goal_type: GoalType::Saving,
            is_personal: true,
            family_id: None,
        };

        let serialized = serde_json::to_string(&input).unwrap();
        assert!(serialized.contains("\"goal_type\":\"saving\""));

        let deserialized: InputGoal = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized.goal_type, GoalType::Saving);
    }

    #[test]
    fn test_input_expense_date_is_optional() {
        let deserialized: InputExpense = serde_json::from_str(
            "{\"amount_cents\":5000,\"description\":\"Groceries\",\
             \"budget_id\":null,\"goal_id\":null}",
        )
        .unwrap();

        assert_eq!(deserialized.amount_cents, 5_000);
        assert!(deserialized.date.is_none());
    }
}
