use std::fmt;

use crate::models::budget::Budget;
use crate::models::goal::Goal;

/// The acting user's family affiliation, resolved from their profile at the
/// start of a write transaction. A user without a profile belongs to no
/// family and must fail family-scoped checks explicitly, never silently.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FamilyScope {
    NoProfile,
    NoFamily,
    Member(i32),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ValidationError {
    CrossOwnerBudget,
    CrossOwnerGoal,
    NotFamilyMember,
    MissingFamily,
    NoProfile,
    NonPositiveAmount,
    InsufficientIncome,
}

impl std::error::Error for ValidationError {}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::CrossOwnerBudget => {
                write!(f, "Budget belongs to a different user")
            }
            ValidationError::CrossOwnerGoal => {
                write!(f, "Personal goal belongs to a different user")
            }
            ValidationError::NotFamilyMember => {
                write!(f, "Family goal must belong to the user's family")
            }
            ValidationError::MissingFamily => {
                write!(f, "A family-shared record requires a family")
            }
            ValidationError::NoProfile => {
                write!(f, "User has no profile")
            }
            ValidationError::NonPositiveAmount => {
                write!(f, "Amount must be at least 0.01")
            }
            ValidationError::InsufficientIncome => {
                write!(f, "Monthly income is insufficient for this contribution")
            }
        }
    }
}

pub fn validate_amount_cents(amount_cents: i64) -> Result<(), ValidationError> {
    if amount_cents <= 0 {
        return Err(ValidationError::NonPositiveAmount);
    }

    Ok(())
}

/// An expense may only reference a budget owned by the same user and a goal
/// the user can reach (their own personal goal or a goal shared with their
/// current family).
pub fn validate_expense_links(
    user_id: i32,
    budget: Option<&Budget>,
    goal: Option<&Goal>,
    scope: FamilyScope,
) -> Result<(), ValidationError> {
    if let Some(budget) = budget {
        if budget.user_id != user_id {
            return Err(ValidationError::CrossOwnerBudget);
        }
    }

    if let Some(goal) = goal {
        validate_contribution_goal(user_id, goal, scope)?;
    }

    Ok(())
}

/// A user may contribute only to their own personal goals or to family goals
/// of a family they currently belong to. Expenses linked to a goal follow the
/// same rule.
pub fn validate_contribution_goal(
    user_id: i32,
    goal: &Goal,
    scope: FamilyScope,
) -> Result<(), ValidationError> {
    if goal.is_personal {
        if goal.user_id != user_id {
            return Err(ValidationError::CrossOwnerGoal);
        }

        return Ok(());
    }

    validate_family_target(goal.family_id, scope)
}

/// A non-personal goal must name a family, and its owner must currently be a
/// member of that family.
pub fn validate_goal_scope(
    is_personal: bool,
    family_id: Option<i32>,
    scope: FamilyScope,
) -> Result<(), ValidationError> {
    if is_personal {
        return Ok(());
    }

    validate_family_target(family_id, scope)
}

/// Same rule as `validate_goal_scope`, applied to family-flagged budgets.
pub fn validate_budget_scope(
    is_family: bool,
    family_id: Option<i32>,
    scope: FamilyScope,
) -> Result<(), ValidationError> {
    if !is_family {
        return Ok(());
    }

    validate_family_target(family_id, scope)
}

fn validate_family_target(
    family_id: Option<i32>,
    scope: FamilyScope,
) -> Result<(), ValidationError> {
    let family_id = match family_id {
        Some(id) => id,
        None => return Err(ValidationError::MissingFamily),
    };

    match scope {
        FamilyScope::NoProfile => Err(ValidationError::NoProfile),
        FamilyScope::NoFamily => Err(ValidationError::NotFamilyMember),
        FamilyScope::Member(member_of) if member_of == family_id => Ok(()),
        FamilyScope::Member(_) => Err(ValidationError::NotFamilyMember),
    }
}
