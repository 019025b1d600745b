//! Code description lookup for the email pipeline.

use sqlx::{PgPool, Row};

use crate::error::StoreError;

/// Fetch the human-readable description for an alarm code, if one has
/// been registered.
pub async fn get_description(pool: &PgPool, code_id: &str) -> Result<Option<String>, StoreError> {
    let row = sqlx::query("SELECT description FROM code_descriptions WHERE code_id = $1")
        .bind(code_id)
        .fetch_optional(pool)
        .await?;

    Ok(match row {
        Some(row) => Some(row.try_get("description")?),
        None => None,
    })
}

/// Insert or replace the description for an alarm code.
pub async fn set_description(
    pool: &PgPool,
    code_id: &str,
    description: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO code_descriptions (code_id, description) VALUES ($1, $2) \
         ON CONFLICT (code_id) DO UPDATE SET description = EXCLUDED.description",
    )
    .bind(code_id)
    .bind(description)
    .execute(pool)
    .await?;
    Ok(())
}
