//! Postgres persistence. Every function here is a thin wrapper around one
//! statement (or one short transaction); business decisions stay in the
//! engine. Writes that race are guarded in the statement itself and report
//! whether they won via `rows_affected`.

pub mod battles;
pub mod injuries;
pub mod kingdoms;
pub mod locks;
pub mod migrate;
pub mod players;
pub mod rolls;
pub mod territories;

pub use migrate::migrate;

/// Decode failure for a TEXT column holding one of our enum strings.
pub(crate) fn column_decode_err(column: &str, value: &str) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("unrecognized value {value:?}").into(),
    }
}
