use anyhow::Result;
use tracing::instrument;

use crate::db::Db;
use crate::models::UserRow;

impl Db {
  /// Creates the user on first contact, refreshes profile fields on every
  /// later one. Soft-deactivated users are reactivated by coming back.
  #[instrument(skip(self))]
  pub async fn upsert_user(
    &self,
    id: i64,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    language_code: Option<String>,
  ) -> Result<UserRow> {
    let user = sqlx::query_as::<_, UserRow>(
      r#"
      INSERT INTO users (id, username, first_name, last_name, language_code)
      VALUES ($1, $2, $3, $4, $5)
      ON CONFLICT (id) DO UPDATE SET
        username = EXCLUDED.username,
        first_name = EXCLUDED.first_name,
        last_name = EXCLUDED.last_name,
        language_code = EXCLUDED.language_code,
        is_active = TRUE
      RETURNING id, username, first_name, last_name, language_code, is_active, created_at
      "#,
    )
    .bind(id)
    .bind(username)
    .bind(first_name)
    .bind(last_name)
    .bind(language_code)
    .fetch_one(&self.pool)
    .await?;
    Ok(user)
  }

  #[instrument(skip(self))]
  pub async fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>(
      r#"
      SELECT id, username, first_name, last_name, language_code, is_active, created_at
      FROM users
      WHERE id = $1 AND is_active = TRUE
      "#,
    )
    .bind(id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(user)
  }
}
