pub mod audit;
pub mod auth;
pub mod badges;
pub mod cms;
pub mod contact;
pub mod reports;
pub mod uploads;
pub mod users;

/// Postgres unique_violation, used wherever a uniqueness rule is enforced by
/// an index instead of a read-then-write check.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}
