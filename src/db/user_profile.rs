use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::{dsl, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};

use crate::db::{self, DaoError, DbThreadPool};
use crate::models::user_profile::{NewUserProfile, UserProfile};
use crate::request_io::OutputMonthlyStatus;
use crate::schema::budgets as budget_fields;
use crate::schema::budgets::dsl::budgets;
use crate::schema::expenses as expense_fields;
use crate::schema::expenses::dsl::expenses;
use crate::schema::user_profiles as user_profile_fields;
use crate::schema::user_profiles::dsl::user_profiles;
use crate::validators::{self, FamilyScope};

/// Resolves the acting user's family affiliation for validation. Reads the
/// profile's cached `family_id`, which membership transactions keep in sync
/// with the `family_memberships` table.
pub(crate) fn family_scope_for_user(
    conn: &mut PgConnection,
    user_id: i32,
) -> Result<FamilyScope, diesel::result::Error> {
    let family_id = user_profiles
        .filter(user_profile_fields::user_id.eq(user_id))
        .select(user_profile_fields::family_id)
        .first::<Option<i32>>(conn)
        .optional()?;

    Ok(match family_id {
        None => FamilyScope::NoProfile,
        Some(None) => FamilyScope::NoFamily,
        Some(Some(family_id)) => FamilyScope::Member(family_id),
    })
}

/// Get-or-create for profiles. Safe to call from concurrent transactions;
/// the insert backs off on the `user_id` unique constraint.
pub(crate) fn ensure_profile(
    conn: &mut PgConnection,
    user_id: i32,
) -> Result<UserProfile, diesel::result::Error> {
    let existing = user_profiles
        .filter(user_profile_fields::user_id.eq(user_id))
        .first::<UserProfile>(conn)
        .optional()?;

    if let Some(profile) = existing {
        return Ok(profile);
    }

    let current_time = Utc::now().naive_utc();
    let new_profile = NewUserProfile {
        user_id,
        family_id: None,
        monthly_income_cents: 0,
        created_timestamp: current_time,
        modified_timestamp: current_time,
    };

    dsl::insert_into(user_profiles)
        .values(&new_profile)
        .on_conflict(user_profile_fields::user_id)
        .do_nothing()
        .execute(conn)?;

    user_profiles
        .filter(user_profile_fields::user_id.eq(user_id))
        .first::<UserProfile>(conn)
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

    pub fn get_or_create_profile(&self, user_id: i32) -> Result<UserProfile, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        let profile = db_connection
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| ensure_profile(conn, user_id))?;

        Ok(profile)
    }

    pub fn get_profile(&self, user_id: i32) -> Result<UserProfile, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        Ok(user_profiles
            .filter(user_profile_fields::user_id.eq(user_id))
            .first::<UserProfile>(&mut db_connection)?)
    }

    pub fn set_monthly_income(
        &self,
        user_id: i32,
        monthly_income_cents: i64,
    ) -> Result<UserProfile, DaoError> {
        validators::validate_amount_cents(monthly_income_cents)?;

        let mut db_connection = self.db_thread_pool.get()?;

        let profile = db_connection
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                let profile = ensure_profile(conn, user_id)?;

                dsl::update(user_profiles.find(profile.id))
                    .set((
                        user_profile_fields::monthly_income_cents.eq(monthly_income_cents),
                        user_profile_fields::modified_timestamp.eq(Utc::now().naive_utc()),
                    ))
                    .get_result::<UserProfile>(conn)
            })?;

        Ok(profile)
    }

    /// Point-in-time snapshot of a user's month: expenses logged, budget
    /// allocations created, income, and what is left after both.
    pub fn get_monthly_status(
        &self,
        user_id: i32,
        year: i32,
        month: u32,
    ) -> Result<OutputMonthlyStatus, DaoError> {
        let (window_start, window_end) = db::month_bounds(year, month)?;

        let mut db_connection = self.db_thread_pool.get()?;

        let status = db_connection
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                let profile = ensure_profile(conn, user_id)?;

                let expense_amounts = expenses
                    .select(expense_fields::amount_cents)
                    .filter(expense_fields::user_id.eq(user_id))
                    .filter(expense_fields::date.ge(window_start))
                    .filter(expense_fields::date.lt(window_end))
                    .load::<i64>(conn)?;

                let budget_amounts = budgets
                    .select(budget_fields::amount_cents)
                    .filter(budget_fields::user_id.eq(user_id))
                    .filter(
                        budget_fields::created_timestamp
                            .ge(window_start.and_time(chrono::NaiveTime::MIN)),
                    )
                    .filter(
                        budget_fields::created_timestamp
                            .lt(window_end.and_time(chrono::NaiveTime::MIN)),
                    )
                    .load::<i64>(conn)?;

                let monthly_expense_cents: i64 = expense_amounts.iter().sum();
                let monthly_budget_cents: i64 = budget_amounts.iter().sum();

                Ok(OutputMonthlyStatus {
                    monthly_expense_cents,
                    monthly_budget_cents,
                    monthly_income_cents: profile.monthly_income_cents,
                    remaining_cents: profile.monthly_income_cents
                        - monthly_expense_cents
                        - monthly_budget_cents,
                })
            })?;

        Ok(status)
    }
}
