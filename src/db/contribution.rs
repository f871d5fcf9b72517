use chrono::{NaiveDate, Utc};
use diesel::pg::PgConnection;
use diesel::{dsl, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};

use crate::db::{user_profile, DaoError, DbThreadPool};
use crate::models::budget::NewBudget;
use crate::models::contribution::{Contribution, NewContribution};
use crate::models::goal::Goal;
use crate::models::user_profile::UserProfile;
use crate::request_io::InputContribution;
use crate::schema::budgets as budget_fields;
use crate::schema::budgets::dsl::budgets;
use crate::schema::contributions as contribution_fields;
use crate::schema::contributions::dsl::contributions;
use crate::schema::goals::dsl::goals;
use crate::schema::user_profiles as user_profile_fields;
use crate::schema::user_profiles::dsl::user_profiles;
use crate::validators::{self, ValidationError};

pub const SETTLEMENT_CATEGORY: &str = "Contribution";

/// Name of the synthetic budget bucket that accumulates contributions toward
/// a goal. Derived deterministically so repeated contributions hit the same
/// row.
pub fn settlement_bucket_name(goal_name: &str) -> String {
    format!("Contribution to {goal_name}")
}

pub struct Dao {
    db_thread_pool: DbThreadPool,
}

impl Dao {
    pub fn new(db_thread_pool: &DbThreadPool) -> Self {
        Self {
            db_thread_pool: db_thread_pool.clone(),
        }
    }

    /// Records a contribution and settles its side effects in one
    /// transaction: the synthetic budget bucket is incremented (or created)
    /// and the contributor's monthly income is debited. Any failure rolls the
    /// whole operation back, including the contribution row itself.
    pub fn create_contribution(
        &self,
        user_id: i32,
        contribution: &InputContribution,
        today: NaiveDate,
    ) -> Result<Contribution, DaoError> {
        validators::validate_amount_cents(contribution.amount_cents)?;

        let mut db_connection = self.db_thread_pool.get()?;

        let created_contribution = db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let goal = goals
                    .find(contribution.goal_id)
                    .first::<Goal>(conn)?;

                let scope = user_profile::family_scope_for_user(conn, user_id)?;
                validators::validate_contribution_goal(user_id, &goal, scope)?;

                let new_contribution = NewContribution {
                    user_id,
                    goal_id: goal.id,
                    amount_cents: contribution.amount_cents,
                    date: today,
                    created_timestamp: Utc::now().naive_utc(),
                };

                let created_contribution = dsl::insert_into(contributions)
                    .values(&new_contribution)
                    .get_result::<Contribution>(conn)?;

                settle_contribution(conn, user_id, &goal, contribution.amount_cents)?;

                Ok(created_contribution)
            })?;

        Ok(created_contribution)
    }

    pub fn get_contributions_for_user(&self, user_id: i32) -> Result<Vec<Contribution>, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        Ok(contributions
            .filter(contribution_fields::user_id.eq(user_id))
            .order(contribution_fields::date.desc())
            .load::<Contribution>(&mut db_connection)?)
    }

    pub fn get_contributions_for_goal(&self, goal_id: i32) -> Result<Vec<Contribution>, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        Ok(contributions
            .filter(contribution_fields::goal_id.eq(goal_id))
            .order(contribution_fields::date.asc())
            .load::<Contribution>(&mut db_connection)?)
    }
}

fn settle_contribution(
    conn: &mut PgConnection,
    user_id: i32,
    goal: &Goal,
    amount_cents: i64,
) -> Result<(), DaoError> {
    let bucket_name = settlement_bucket_name(&goal.name);

    let new_bucket = NewBudget {
        user_id,
        name: &bucket_name,
        amount_cents,
        category: SETTLEMENT_CATEGORY,
        is_family: false,
        family_id: None,
        created_timestamp: Utc::now().naive_utc(),
    };

    dsl::insert_into(budgets)
        .values(&new_bucket)
        .on_conflict((budget_fields::user_id, budget_fields::name))
        .do_update()
        .set(budget_fields::amount_cents.eq(budget_fields::amount_cents + amount_cents))
        .execute(conn)?;

    let profile = user_profiles
        .filter(user_profile_fields::user_id.eq(user_id))
        .for_update()
        .first::<UserProfile>(conn)
        .optional()?;

    let profile = match profile {
        Some(profile) => profile,
        None => return Err(ValidationError::NoProfile.into()),
    };

    if profile.monthly_income_cents < amount_cents {
        return Err(ValidationError::InsufficientIncome.into());
    }

    dsl::update(user_profiles.find(profile.id))
        .set((
            user_profile_fields::monthly_income_cents
                .eq(profile.monthly_income_cents - amount_cents),
            user_profile_fields::modified_timestamp.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::Rng;

    use crate::db::{goal, user_profile};
    use crate::models::budget::Budget;
    use crate::models::goal::GoalType;
    use crate::request_io::InputGoal;
    use crate::test_env;

    fn saving_goal(dao: &goal::Dao, user_id: i32, name: &str) -> Goal {
        dao.create_goal(
            user_id,
            &InputGoal {
                name: String::from(name),
                amount_cents: 100_000,
                goal_type: GoalType::Saving,
                is_personal: true,
                family_id: None,
            },
        )
        .unwrap()
    }

    #[test]
    #[ignore]
    fn test_contribution_settles_bucket_income_and_progress() {
        let dao = Dao::new(test_env::db::db_thread_pool());
        let goal_dao = goal::Dao::new(test_env::db::db_thread_pool());
        let profile_dao = user_profile::Dao::new(test_env::db::db_thread_pool());

        let user_id = rand::thread_rng().gen_range(1..i32::MAX);
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();

        profile_dao.set_monthly_income(user_id, 100_000).unwrap();
        let goal = saving_goal(&goal_dao, user_id, "Emergency Fund");

        let input = InputContribution {
            goal_id: goal.id,
            amount_cents: 25_000,
        };
        dao.create_contribution(user_id, &input, today).unwrap();

        let status = goal_dao.get_goal_status(goal.id).unwrap();
        assert_eq!(status.progress_cents, 25_000);
        assert_eq!(status.percentage, 25.0);
        assert_eq!(status.remaining_cents, 75_000);

        let profile = profile_dao.get_profile(user_id).unwrap();
        assert_eq!(profile.monthly_income_cents, 75_000);

        // A second contribution lands in the same synthetic bucket.
        dao.create_contribution(user_id, &input, today).unwrap();

        let mut db_connection = test_env::db::db_thread_pool().get().unwrap();
        let bucket = budgets
            .filter(budget_fields::user_id.eq(user_id))
            .filter(budget_fields::name.eq(settlement_bucket_name(&goal.name)))
            .first::<Budget>(&mut db_connection)
            .unwrap();
        assert_eq!(bucket.amount_cents, 50_000);
        assert_eq!(bucket.category, SETTLEMENT_CATEGORY);
    }

    #[test]
    #[ignore]
    fn test_insufficient_income_rolls_back_the_contribution() {
        let dao = Dao::new(test_env::db::db_thread_pool());
        let goal_dao = goal::Dao::new(test_env::db::db_thread_pool());
        let profile_dao = user_profile::Dao::new(test_env::db::db_thread_pool());

        let user_id = rand::thread_rng().gen_range(1..i32::MAX);
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();

        profile_dao.set_monthly_income(user_id, 10_000).unwrap();
        let goal = saving_goal(&goal_dao, user_id, "Vacation");

        let result = dao.create_contribution(
            user_id,
            &InputContribution {
                goal_id: goal.id,
                amount_cents: 25_000,
            },
            today,
        );
        assert!(matches!(
            result,
            Err(DaoError::Validation(ValidationError::InsufficientIncome))
        ));

        // Nothing settled: no contribution row, no bucket, income untouched.
        assert!(dao.get_contributions_for_goal(goal.id).unwrap().is_empty());

        let mut db_connection = test_env::db::db_thread_pool().get().unwrap();
        let bucket = budgets
            .filter(budget_fields::user_id.eq(user_id))
            .filter(budget_fields::name.eq(settlement_bucket_name(&goal.name)))
            .first::<Budget>(&mut db_connection)
            .optional()
            .unwrap();
        assert!(bucket.is_none());

        let profile = profile_dao.get_profile(user_id).unwrap();
        assert_eq!(profile.monthly_income_cents, 10_000);
    }
}
