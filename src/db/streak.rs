use chrono::NaiveDate;
use diesel::pg::PgConnection;
use diesel::{dsl, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};

use crate::db::{DaoError, DbThreadPool};
use crate::models::streak::{NewStreak, Streak};
use crate::schema::streaks as streak_fields;
use crate::schema::streaks::dsl::streaks;

/// Streak transition. Crediting the same day twice is a no-op (a
/// `last_updated` in the future is treated the same way), consecutive days
/// increment, and a gap of two or more days hard-resets the count to one.
fn advanced(count: i32, last_updated: NaiveDate, today: NaiveDate) -> (i32, NaiveDate) {
    if last_updated >= today {
        (count, last_updated)
    } else if today.pred_opt() == Some(last_updated) {
        (count + 1, today)
    } else {
        (1, today)
    }
}

/// Locked get-or-create for a user's streak row. The insert backs off on the
/// `user_id` unique constraint, so when two first touches race, one row is
/// created and both callers end up holding it under the lock.
fn ensure_streak_locked(
    conn: &mut PgConnection,
    user_id: i32,
    today: NaiveDate,
) -> Result<Streak, diesel::result::Error> {
    let existing = streaks
        .filter(streak_fields::user_id.eq(user_id))
        .for_update()
        .first::<Streak>(conn)
        .optional()?;

    if let Some(streak) = existing {
        return Ok(streak);
    }

    dsl::insert_into(streaks)
        .values(&NewStreak {
            user_id,
            count: 0,
            last_updated: today,
        })
        .on_conflict(streak_fields::user_id)
        .do_nothing()
        .execute(conn)?;

    streaks
        .filter(streak_fields::user_id.eq(user_id))
        .for_update()
        .first::<Streak>(conn)
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

    /// Credits today's activity. The row is created on first touch
    /// (`count = 0`) and held under a row lock while the transition is
    /// applied, so concurrent advances cannot double-credit a day.
    pub fn advance(&self, user_id: i32, today: NaiveDate) -> Result<Streak, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        let streak = db_connection
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| {
                let streak = ensure_streak_locked(conn, user_id, today)?;

                let (new_count, new_last_updated) =
                    advanced(streak.count, streak.last_updated, today);

                if new_count == streak.count && new_last_updated == streak.last_updated {
                    return Ok(streak);
                }

                dsl::update(streaks.find(streak.id))
                    .set((
                        streak_fields::count.eq(new_count),
                        streak_fields::last_updated.eq(new_last_updated),
                    ))
                    .get_result::<Streak>(conn)
            })?;

        Ok(streak)
    }

    /// Read access with the same lazy-creation semantics as `advance`; a
    /// missing streak is never an error.
    pub fn get_or_create_streak(&self, user_id: i32, today: NaiveDate) -> Result<Streak, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        let streak = db_connection
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|conn| ensure_streak_locked(conn, user_id, today))?;

        Ok(streak)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_advancing_twice_on_the_same_day_is_idempotent() {
        let today = date(2025, 6, 15);

        let (count, last_updated) = advanced(5, date(2025, 6, 14), today);
        assert_eq!(count, 6);
        assert_eq!(last_updated, today);

        let (count, last_updated) = advanced(count, last_updated, today);
        assert_eq!(count, 6);
        assert_eq!(last_updated, today);
    }

    #[test]
    fn test_consecutive_days_increment_the_count() {
        let (count, last_updated) = advanced(1, date(2025, 6, 14), date(2025, 6, 15));
        assert_eq!(count, 2);
        assert_eq!(last_updated, date(2025, 6, 15));
    }

    #[test]
    fn test_a_gap_of_two_or_more_days_resets_the_count() {
        let (count, last_updated) = advanced(5, date(2025, 6, 13), date(2025, 6, 15));
        assert_eq!(count, 1);
        assert_eq!(last_updated, date(2025, 6, 15));

        let (count, _) = advanced(30, date(2025, 1, 1), date(2025, 6, 15));
        assert_eq!(count, 1);
    }

    #[test]
    fn test_a_future_last_updated_is_left_alone() {
        let (count, last_updated) = advanced(3, date(2025, 6, 20), date(2025, 6, 15));
        assert_eq!(count, 3);
        assert_eq!(last_updated, date(2025, 6, 20));
    }

    #[test]
    fn test_increment_across_month_and_year_boundaries() {
        let (count, _) = advanced(9, date(2025, 6, 30), date(2025, 7, 1));
        assert_eq!(count, 10);

        let (count, _) = advanced(99, date(2025, 12, 31), date(2026, 1, 1));
        assert_eq!(count, 100);
    }

    mod db {
        use super::*;

        use rand::Rng;

        use crate::test_env;

        #[test]
        #[ignore]
        fn test_advance_creates_then_counts_consecutive_days() {
            let dao = Dao::new(test_env::db::db_thread_pool());

            let user_id = rand::thread_rng().gen_range(1..i32::MAX);

            let streak = dao.advance(user_id, date(2025, 6, 14)).unwrap();
            assert_eq!(streak.count, 0);
            assert_eq!(streak.last_updated, date(2025, 6, 14));

            let streak = dao.advance(user_id, date(2025, 6, 15)).unwrap();
            assert_eq!(streak.count, 1);

            // Same day again: unchanged.
            let streak = dao.advance(user_id, date(2025, 6, 15)).unwrap();
            assert_eq!(streak.count, 1);

            // Two-day gap: hard reset.
            let streak = dao.advance(user_id, date(2025, 6, 18)).unwrap();
            assert_eq!(streak.count, 1);
            assert_eq!(streak.last_updated, date(2025, 6, 18));
        }

        #[test]
        #[ignore]
        fn test_concurrent_first_advances_do_not_error() {
            let user_id = rand::thread_rng().gen_range(1..i32::MAX);
            let today = date(2025, 6, 15);

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    std::thread::spawn(move || {
                        Dao::new(test_env::db::db_thread_pool()).advance(user_id, today)
                    })
                })
                .collect();

            // The loser of the insert race backs off and re-reads the
            // winner's row; neither call surfaces a unique violation.
            for handle in handles {
                let streak = handle.join().unwrap().unwrap();
                assert_eq!(streak.count, 0);
                assert_eq!(streak.last_updated, today);
            }
        }
    }
}
