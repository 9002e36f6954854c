use anyhow::Result;
use tracing::instrument;

use crate::db::Db;
use crate::models::FaqRow;

/// First letter uppercased, the rest untouched.
fn capitalize_first(input: &str) -> String {
  let mut chars = input.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    None => String::new(),
  }
}

/// Backslash-escapes LIKE metacharacters so user input matches literally.
fn escape_like(input: &str) -> String {
  let mut out = String::with_capacity(input.len());
  for ch in input.chars() {
    if matches!(ch, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(ch);
  }
  out
}

impl Db {
  #[instrument(skip(self))]
  pub async fn faq_page(&self, page: u64, per_page: u64) -> Result<(Vec<FaqRow>, u64)> {
    let total = sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM faq_items WHERE is_active = TRUE"#)
      .fetch_one(&self.pool)
      .await?;

    let offset = (page.saturating_sub(1) * per_page) as i64;
    let items = sqlx::query_as::<_, FaqRow>(
      r#"
      SELECT id, question, answer, is_active
      FROM faq_items
      WHERE is_active = TRUE
      ORDER BY id
      LIMIT $1 OFFSET $2
      "#,
    )
    .bind(per_page as i64)
    .bind(offset)
    .fetch_all(&self.pool)
    .await?;

    Ok((items, total as u64))
  }

  #[instrument(skip(self))]
  pub async fn get_faq_item(&self, item_id: i64) -> Result<Option<FaqRow>> {
    let item = sqlx::query_as::<_, FaqRow>(
      r#"SELECT id, question, answer, is_active FROM faq_items WHERE id = $1 AND is_active = TRUE"#,
    )
    .bind(item_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(item)
  }

  /// Substring search over questions. Matches the literal lowercase and
  /// capitalized forms of the query rather than doing a true case-fold;
  /// kept as-is from the previous implementation. LIKE metacharacters in
  /// the query are escaped so `%` and `_` match themselves.
  #[instrument(skip(self))]
  pub async fn search_faq(&self, query: &str, page: u64, per_page: u64) -> Result<(Vec<FaqRow>, u64)> {
    let lower = escape_like(&query.to_lowercase());
    let capitalized = capitalize_first(&lower);

    let total = sqlx::query_scalar::<_, i64>(
      r#"
      SELECT COUNT(*) FROM faq_items
      WHERE is_active = TRUE
        AND (question LIKE '%' || $1 || '%' ESCAPE '\'
          OR question LIKE '%' || $2 || '%' ESCAPE '\')
      "#,
    )
    .bind(&lower)
    .bind(&capitalized)
    .fetch_one(&self.pool)
    .await?;

    let offset = (page.saturating_sub(1) * per_page) as i64;
    let items = sqlx::query_as::<_, FaqRow>(
      r#"
      SELECT id, question, answer, is_active
      FROM faq_items
      WHERE is_active = TRUE
        AND (question LIKE '%' || $1 || '%' ESCAPE '\'
          OR question LIKE '%' || $2 || '%' ESCAPE '\')
      ORDER BY id
      LIMIT $3 OFFSET $4
      "#,
    )
    .bind(&lower)
    .bind(&capitalized)
    .bind(per_page as i64)
    .bind(offset)
    .fetch_all(&self.pool)
    .await?;

    Ok((items, total as u64))
  }

  /// Flips the soft-delete flag and returns the new state; `None` when the
  /// item is unknown.
  #[instrument(skip(self))]
  pub async fn toggle_faq_active(&self, item_id: i64) -> Result<Option<bool>> {
    let active = sqlx::query_scalar::<_, bool>(
      r#"UPDATE faq_items SET is_active = NOT is_active WHERE id = $1 RETURNING is_active"#,
    )
    .bind(item_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(active)
  }
}

#[cfg(test)]
mod tests {
  use super::capitalize_first;
  use super::escape_like;

  #[test]
  fn capitalizes_first_letter_only() {
    assert_eq!(capitalize_first("доставка"), "Доставка");
    assert_eq!(capitalize_first("how to pay"), "How to pay");
    assert_eq!(capitalize_first(""), "");
  }

  #[test]
  fn escapes_like_metacharacters() {
    assert_eq!(escape_like("100%_off"), r"100\%\_off");
    assert_eq!(escape_like(r"a\b"), r"a\\b");
    assert_eq!(escape_like("%"), r"\%");
  }

  #[test]
  fn plain_queries_pass_through_unchanged() {
    assert_eq!(escape_like("доставка цветов"), "доставка цветов");
  }
}
