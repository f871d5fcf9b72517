use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::{dsl, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};

use crate::db::{self, user_profile, DaoError, DbThreadPool};
use crate::models::family::{Family, NewFamily};
use crate::models::family_membership::NewFamilyMembership;
use crate::request_io::OutputFamilyFinancials;
use crate::schema::expenses as expense_fields;
use crate::schema::expenses::dsl::expenses;
use crate::schema::families as family_fields;
use crate::schema::families::dsl::families;
use crate::schema::family_memberships as membership_fields;
use crate::schema::family_memberships::dsl::family_memberships;
use crate::schema::user_profiles as user_profile_fields;
use crate::schema::user_profiles::dsl::user_profiles;

pub struct Dao {
    db_thread_pool: DbThreadPool,
}

impl Dao {
    pub fn new(db_thread_pool: &DbThreadPool) -> Self {
        Self {
            db_thread_pool: db_thread_pool.clone(),
        }
    }

    /// Creates a family with the creator as its first member. Any family the
    /// creator leaves behind is locked before their membership moves.
    pub fn create_family(&self, name: &str, creator_user_id: i32) -> Result<Family, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        let family = db_connection
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                let family = dsl::insert_into(families)
                    .values(&NewFamily {
                        name,
                        created_timestamp: Utc::now().naive_utc(),
                    })
                    .get_result::<Family>(conn)?;

                let mut previous_family_ids = family_memberships
                    .select(membership_fields::family_id)
                    .filter(membership_fields::user_id.eq(creator_user_id))
                    .load::<i32>(conn)?;
                lock_families(conn, &mut previous_family_ids)?;

                attach_member(conn, family.id, creator_user_id)?;

                Ok(family)
            })?;

        Ok(family)
    }

    /// Adds a user to a family. Every family the move touches, the target
    /// and any family the user is leaving, is locked in id order for the
    /// duration so concurrent membership changes serialize. A user belongs
    /// to at most one family; joining moves them, and a family they leave
    /// empty is deleted.
    pub fn add_member(&self, family_id: i32, user_id: i32) -> Result<(), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                let mut involved_family_ids = family_memberships
                    .select(membership_fields::family_id)
                    .filter(membership_fields::user_id.eq(user_id))
                    .load::<i32>(conn)?;
                involved_family_ids.push(family_id);

                lock_families(conn, &mut involved_family_ids)?;

                families.find(family_id).first::<Family>(conn)?;

                attach_member(conn, family_id, user_id)
            })?;

        Ok(())
    }

    /// Removes a member, clears their profile's family pointer, and deletes
    /// the family once its member count reaches zero.
    pub fn remove_member(&self, family_id: i32, user_id: i32) -> Result<(), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                families
                    .find(family_id)
                    .for_update()
                    .first::<Family>(conn)?;

                let affected_row_count = dsl::delete(
                    family_memberships
                        .filter(membership_fields::family_id.eq(family_id))
                        .filter(membership_fields::user_id.eq(user_id)),
                )
                .execute(conn)?;

                if affected_row_count == 0 {
                    return Err(diesel::result::Error::NotFound);
                }

                dsl::update(user_profiles.filter(user_profile_fields::user_id.eq(user_id)))
                    .set(user_profile_fields::family_id.eq(None::<i32>))
                    .execute(conn)?;

                reap_family_if_empty(conn, family_id)
            })?;

        Ok(())
    }

    /// User ids of a family's members in join order.
    pub fn get_members(&self, family_id: i32) -> Result<Vec<i32>, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        Ok(family_memberships
            .select(membership_fields::user_id)
            .filter(membership_fields::family_id.eq(family_id))
            .order(membership_fields::created_timestamp.asc())
            .load::<i32>(&mut db_connection)?)
    }

    pub fn get_user_family(&self, user_id: i32) -> Result<Option<Family>, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        let family_id = family_memberships
            .select(membership_fields::family_id)
            .filter(membership_fields::user_id.eq(user_id))
            .first::<i32>(&mut db_connection)
            .optional()?;

        match family_id {
            Some(family_id) => Ok(families
                .find(family_id)
                .first::<Family>(&mut db_connection)
                .optional()?),
            None => Ok(None),
        }
    }

    /// Family-wide rollup for one calendar month: member incomes, member
    /// expenses in the window, and the savings left over (clamped at zero).
    pub fn get_family_financials(
        &self,
        family_id: i32,
        year: i32,
        month: u32,
    ) -> Result<OutputFamilyFinancials, DaoError> {
        let (window_start, window_end) = db::month_bounds(year, month)?;

        let mut db_connection = self.db_thread_pool.get()?;

        families
            .find(family_id)
            .first::<Family>(&mut db_connection)?;

        let member_user_ids = family_memberships
            .select(membership_fields::user_id)
            .filter(membership_fields::family_id.eq(family_id))
            .load::<i32>(&mut db_connection)?;

        let income_amounts = user_profiles
            .select(user_profile_fields::monthly_income_cents)
            .filter(user_profile_fields::user_id.eq_any(&member_user_ids))
            .load::<i64>(&mut db_connection)?;

        let expense_amounts = expenses
            .select(expense_fields::amount_cents)
            .filter(expense_fields::user_id.eq_any(&member_user_ids))
            .filter(expense_fields::date.ge(window_start))
            .filter(expense_fields::date.lt(window_end))
            .load::<i64>(&mut db_connection)?;

        let income_cents: i64 = income_amounts.iter().sum();
        let expense_cents: i64 = expense_amounts.iter().sum();

        let savings_cents = if income_cents > expense_cents {
            income_cents - expense_cents
        } else {
            0
        };

        Ok(OutputFamilyFinancials {
            family_id,
            income_cents,
            expense_cents,
            savings_cents,
            year,
            month,
        })
    }
}

/// Locks the given family rows with `FOR UPDATE`, in ascending id order so
/// transactions touching overlapping families never acquire in opposite
/// orders. Ids whose row no longer exists are skipped.
fn lock_families(
    conn: &mut PgConnection,
    family_ids: &mut Vec<i32>,
) -> Result<(), diesel::result::Error> {
    family_ids.sort_unstable();
    family_ids.dedup();

    for locked_family_id in family_ids {
        families
            .find(*locked_family_id)
            .for_update()
            .first::<Family>(conn)
            .optional()?;
    }

    Ok(())
}

/// Moves a user into a family: drops any previous membership (reaping a
/// family left empty), inserts the new membership row, and refreshes the
/// profile's cached family pointer. Creates the profile if the user has
/// none yet. Re-adding an existing member is a no-op, so the original join
/// timestamp survives. Callers must already hold locks on every family
/// involved.
fn attach_member(
    conn: &mut PgConnection,
    family_id: i32,
    user_id: i32,
) -> Result<(), diesel::result::Error> {
    user_profile::ensure_profile(conn, user_id)?;

    let previous_family_ids = family_memberships
        .select(membership_fields::family_id)
        .filter(membership_fields::user_id.eq(user_id))
        .load::<i32>(conn)?;

    if previous_family_ids.contains(&family_id) {
        return Ok(());
    }

    dsl::delete(family_memberships.filter(membership_fields::user_id.eq(user_id)))
        .execute(conn)?;

    dsl::insert_into(family_memberships)
        .values(&NewFamilyMembership {
            family_id,
            user_id,
            created_timestamp: Utc::now().naive_utc(),
        })
        .execute(conn)?;

    dsl::update(user_profiles.filter(user_profile_fields::user_id.eq(user_id)))
        .set(user_profile_fields::family_id.eq(Some(family_id)))
        .execute(conn)?;

    for previous_family_id in previous_family_ids {
        if previous_family_id != family_id {
            reap_family_if_empty(conn, previous_family_id)?;
        }
    }

    Ok(())
}

fn reap_family_if_empty(
    conn: &mut PgConnection,
    family_id: i32,
) -> Result<(), diesel::result::Error> {
    let member_count = family_memberships
        .filter(membership_fields::family_id.eq(family_id))
        .count()
        .get_result::<i64>(conn)?;

    if member_count == 0 {
        dsl::delete(families.filter(family_fields::id.eq(family_id))).execute(conn)?;
        log::info!("Deleted family {family_id} after its last member left");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDate;
    use rand::Rng;

    use crate::db::{expense, user_profile};
    use crate::request_io::InputExpense;
    use crate::test_env;

    #[test]
    #[ignore]
    fn test_family_financials_roll_up_member_incomes_and_expenses() {
        let dao = Dao::new(test_env::db::db_thread_pool());
        let profile_dao = user_profile::Dao::new(test_env::db::db_thread_pool());
        let expense_dao = expense::Dao::new(test_env::db::db_thread_pool());

        let mut rng = rand::thread_rng();
        let first_user_id = rng.gen_range(1..i32::MAX);
        let second_user_id = rng.gen_range(1..i32::MAX);
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();

        profile_dao.set_monthly_income(first_user_id, 200_000).unwrap();
        profile_dao.set_monthly_income(second_user_id, 150_000).unwrap();

        let family = dao.create_family("Testers", first_user_id).unwrap();
        dao.add_member(family.id, second_user_id).unwrap();

        expense_dao
            .create_expense(
                first_user_id,
                &InputExpense {
                    amount_cents: 7_500,
                    description: String::from("Utilities"),
                    date: None,
                    budget_id: None,
                    goal_id: None,
                },
                today,
            )
            .unwrap();

        let financials = dao.get_family_financials(family.id, 2025, 6).unwrap();
        assert_eq!(financials.income_cents, 350_000);
        assert_eq!(financials.expense_cents, 7_500);
        assert_eq!(financials.savings_cents, 342_500);
    }

    #[test]
    #[ignore]
    fn test_family_is_deleted_when_its_last_member_leaves() {
        let dao = Dao::new(test_env::db::db_thread_pool());

        let mut rng = rand::thread_rng();
        let first_user_id = rng.gen_range(1..i32::MAX);
        let second_user_id = rng.gen_range(1..i32::MAX);

        let family = dao.create_family("Leavers", first_user_id).unwrap();
        dao.add_member(family.id, second_user_id).unwrap();

        dao.remove_member(family.id, first_user_id).unwrap();
        assert!(dao.get_user_family(second_user_id).unwrap().is_some());

        dao.remove_member(family.id, second_user_id).unwrap();

        let mut db_connection = test_env::db::db_thread_pool().get().unwrap();
        let remaining = families
            .find(family.id)
            .first::<Family>(&mut db_connection)
            .optional()
            .unwrap();
        assert!(remaining.is_none());
    }

    #[test]
    #[ignore]
    fn test_concurrent_departures_reap_the_emptied_family() {
        let dao = Dao::new(test_env::db::db_thread_pool());

        let mut rng = rand::thread_rng();
        let first_user_id = rng.gen_range(1..i32::MAX);
        let second_user_id = rng.gen_range(1..i32::MAX);
        let first_anchor_user_id = rng.gen_range(1..i32::MAX);
        let second_anchor_user_id = rng.gen_range(1..i32::MAX);

        let shared_family = dao.create_family("Shared", first_user_id).unwrap();
        dao.add_member(shared_family.id, second_user_id).unwrap();

        let first_target = dao.create_family("FirstTarget", first_anchor_user_id).unwrap();
        let second_target = dao
            .create_family("SecondTarget", second_anchor_user_id)
            .unwrap();

        let first_target_id = first_target.id;
        let second_target_id = second_target.id;

        let first_move = std::thread::spawn(move || {
            Dao::new(test_env::db::db_thread_pool()).add_member(first_target_id, first_user_id)
        });
        let second_move = std::thread::spawn(move || {
            Dao::new(test_env::db::db_thread_pool()).add_member(second_target_id, second_user_id)
        });

        first_move.join().unwrap().unwrap();
        second_move.join().unwrap().unwrap();

        // Whichever move committed last saw the shared family emptied and
        // reaped it.
        let mut db_connection = test_env::db::db_thread_pool().get().unwrap();
        let remaining = families
            .find(shared_family.id)
            .first::<Family>(&mut db_connection)
            .optional()
            .unwrap();
        assert!(remaining.is_none());
    }

    #[test]
    #[ignore]
    fn test_re_adding_a_member_preserves_join_order() {
        let dao = Dao::new(test_env::db::db_thread_pool());

        let mut rng = rand::thread_rng();
        let first_user_id = rng.gen_range(1..i32::MAX);
        let second_user_id = rng.gen_range(1..i32::MAX);

        let family = dao.create_family("Stable", first_user_id).unwrap();
        dao.add_member(family.id, second_user_id).unwrap();

        dao.add_member(family.id, first_user_id).unwrap();

        assert_eq!(
            dao.get_members(family.id).unwrap(),
            vec![first_user_id, second_user_id]
        );
    }

    #[test]
    #[ignore]
    fn test_joining_a_family_moves_the_member() {
        let dao = Dao::new(test_env::db::db_thread_pool());

        let mut rng = rand::thread_rng();
        let mover_user_id = rng.gen_range(1..i32::MAX);
        let anchor_user_id = rng.gen_range(1..i32::MAX);

        let first_family = dao.create_family("First", mover_user_id).unwrap();
        let second_family = dao.create_family("Second", anchor_user_id).unwrap();

        dao.add_member(second_family.id, mover_user_id).unwrap();

        let current = dao.get_user_family(mover_user_id).unwrap().unwrap();
        assert_eq!(current.id, second_family.id);

        // The first family emptied out and was reaped.
        let mut db_connection = test_env::db::db_thread_pool().get().unwrap();
        let remaining = families
            .find(first_family.id)
            .first::<Family>(&mut db_connection)
            .optional()
            .unwrap();
        assert!(remaining.is_none());
    }
}
