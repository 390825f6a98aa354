use sqlx::PgPool;

/// Apply the schema. Every statement in the file is `IF NOT EXISTS`, so
/// running this against an already-migrated database is a no-op.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(include_str!("../../sql/schema.sql"))
        .execute(pool)
        .await?;
    Ok(())
}
