use chrono::Utc;
use diesel::{dsl, ExpressionMethods, QueryDsl, RunQueryDsl};

use crate::db::{self, user_profile, DaoError, DbThreadPool};
use crate::models::goal::{Goal, GoalType, NewGoal};
use crate::request_io::{InputGoal, OutputGoalStatus};
use crate::schema::contributions as contribution_fields;
use crate::schema::contributions::dsl::contributions;
use crate::schema::expenses as expense_fields;
use crate::schema::expenses::dsl::expenses;
use crate::schema::goals as goal_fields;
use crate::schema::goals::dsl::goals;
use crate::validators::{self, FamilyScope};

pub struct Dao {
    db_thread_pool: DbThreadPool,
}

impl Dao {
    pub fn new(db_thread_pool: &DbThreadPool) -> Self {
        Self {
            db_thread_pool: db_thread_pool.clone(),
        }
    }

    pub fn create_goal(&self, user_id: i32, goal: &InputGoal) -> Result<Goal, DaoError> {
        validators::validate_amount_cents(goal.amount_cents)?;

        let mut db_connection = self.db_thread_pool.get()?;

        let created_goal = db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let scope = user_profile::family_scope_for_user(conn, user_id)?;
                validators::validate_goal_scope(goal.is_personal, goal.family_id, scope)?;

                let new_goal = NewGoal {
                    user_id,
                    name: &goal.name,
                    amount_cents: goal.amount_cents,
                    goal_type: goal.goal_type.as_i16(),
                    is_personal: goal.is_personal,
                    // Personal goals are invisible to the family, so no
                    // family link is stored for them.
                    family_id: if goal.is_personal {
                        None
                    } else {
                        goal.family_id
                    },
                    pinned: false,
                    created_timestamp: Utc::now().naive_utc(),
                };

                Ok(dsl::insert_into(goals)
                    .values(&new_goal)
                    .get_result::<Goal>(conn)?)
            })?;

        Ok(created_goal)
    }

    /// Goals the user can see: their own goals plus the shared goals of their
    /// current family. Two bounded queries combined in memory; goals the user
    /// both owns and shares with the family appear once.
    pub fn get_goals_for_user(&self, user_id: i32) -> Result<Vec<Goal>, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        let mut visible_goals = goals
            .filter(goal_fields::user_id.eq(user_id))
            .order(goal_fields::created_timestamp.asc())
            .load::<Goal>(&mut db_connection)?;

        let scope = user_profile::family_scope_for_user(&mut db_connection, user_id)?;

        if let FamilyScope::Member(family_id) = scope {
            let family_goals = goals
                .filter(goal_fields::family_id.eq(family_id))
                .filter(goal_fields::is_personal.eq(false))
                .order(goal_fields::created_timestamp.asc())
                .load::<Goal>(&mut db_connection)?;

            for family_goal in family_goals {
                if !visible_goals.iter().any(|g| g.id == family_goal.id) {
                    visible_goals.push(family_goal);
                }
            }
        }

        Ok(visible_goals)
    }

    /// Pins one goal and unpins every other goal the user owns, inside a
    /// single transaction so no commit point has two pinned goals. All of
    /// the user's goal rows are locked in one id-ordered select, so two
    /// concurrent pins of different goals acquire the locks in the same
    /// order instead of deadlocking.
    pub fn pin_goal(&self, user_id: i32, goal_id: i32) -> Result<Goal, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        let pinned_goal = db_connection
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                let user_goals = goals
                    .filter(goal_fields::user_id.eq(user_id))
                    .order(goal_fields::id.asc())
                    .for_update()
                    .load::<Goal>(conn)?;

                if !user_goals.iter().any(|g| g.id == goal_id) {
                    return Err(diesel::result::Error::NotFound);
                }

                dsl::update(
                    goals
                        .filter(goal_fields::user_id.eq(user_id))
                        .filter(goal_fields::id.ne(goal_id)),
                )
                .set(goal_fields::pinned.eq(false))
                .execute(conn)?;

                dsl::update(goals.find(goal_id))
                    .set(goal_fields::pinned.eq(true))
                    .get_result::<Goal>(conn)
            })?;

        Ok(pinned_goal)
    }

    pub fn unpin_goal(&self, user_id: i32, goal_id: i32) -> Result<Goal, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        Ok(dsl::update(
            goals
                .find(goal_id)
                .filter(goal_fields::user_id.eq(user_id)),
        )
        .set(goal_fields::pinned.eq(false))
        .get_result::<Goal>(&mut db_connection)?)
    }

    /// Progress toward a goal's target, recomputed from raw rows: saving
    /// goals sum their contributions, spending goals sum their linked
    /// expenses. `remaining_cents` goes negative once the goal is exceeded.
    pub fn get_goal_status(&self, goal_id: i32) -> Result<OutputGoalStatus, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        let goal = goals.find(goal_id).first::<Goal>(&mut db_connection)?;

        let goal_type = match goal.goal_type() {
            Some(goal_type) => goal_type,
            None => return Err(DaoError::CannotRunQuery("Goal has an unrecognized type")),
        };

        let amounts = match goal_type {
            GoalType::Saving => contributions
                .select(contribution_fields::amount_cents)
                .filter(contribution_fields::goal_id.eq(goal.id))
                .load::<i64>(&mut db_connection)?,
            GoalType::Spending => expenses
                .select(expense_fields::amount_cents)
                .filter(expense_fields::goal_id.eq(goal.id))
                .load::<i64>(&mut db_connection)?,
        };

        let progress_cents: i64 = amounts.iter().sum();

        Ok(OutputGoalStatus {
            goal_id: goal.id,
            progress_cents,
            percentage: db::percentage_of_cents(progress_cents, goal.amount_cents),
            remaining_cents: goal.amount_cents - progress_cents,
        })
    }

    /// Deletes a goal, cascading to its contributions and detaching its
    /// expenses.
    pub fn delete_goal(&self, user_id: i32, goal_id: i32) -> Result<(), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                let goal = goals
                    .find(goal_id)
                    .filter(goal_fields::user_id.eq(user_id))
                    .for_update()
                    .first::<Goal>(conn)?;

                dsl::delete(contributions.filter(contribution_fields::goal_id.eq(goal.id)))
                    .execute(conn)?;

                dsl::update(expenses.filter(expense_fields::goal_id.eq(goal.id)))
                    .set(expense_fields::goal_id.eq(None::<i32>))
                    .execute(conn)?;

                dsl::delete(goals.find(goal.id)).execute(conn)?;

                Ok(())
            })?;

        Ok(())
    }
}
