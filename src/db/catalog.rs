use anyhow::Result;
use tracing::instrument;

use crate::db::Db;
use crate::models::CategoryRow;
use crate::models::ProductRow;

impl Db {
  /// Active child categories of `parent_id` (`None` for the roots), one page
  /// at a time, together with the total active child count.
  #[instrument(skip(self))]
  pub async fn categories_page(
    &self,
    parent_id: Option<i64>,
    page: u64,
    per_page: u64,
  ) -> Result<(Vec<CategoryRow>, u64)> {
    let total = sqlx::query_scalar::<_, i64>(
      r#"
      SELECT COUNT(*) FROM categories
      WHERE parent_id IS NOT DISTINCT FROM $1 AND is_active = TRUE
      "#,
    )
    .bind(parent_id)
    .fetch_one(&self.pool)
    .await?;

    let offset = (page.saturating_sub(1) * per_page) as i64;
    let categories = sqlx::query_as::<_, CategoryRow>(
      r#"
      SELECT id, name, parent_id, is_active
      FROM categories
      WHERE parent_id IS NOT DISTINCT FROM $1 AND is_active = TRUE
      ORDER BY name
      LIMIT $2 OFFSET $3
      "#,
    )
    .bind(parent_id)
    .bind(per_page as i64)
    .bind(offset)
    .fetch_all(&self.pool)
    .await?;

    Ok((categories, total as u64))
  }

  #[instrument(skip(self))]
  pub async fn get_category(&self, category_id: i64) -> Result<Option<CategoryRow>> {
    let category = sqlx::query_as::<_, CategoryRow>(
      r#"
      SELECT id, name, parent_id, is_active
      FROM categories
      WHERE id = $1 AND is_active = TRUE
      "#,
    )
    .bind(category_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(category)
  }

  #[instrument(skip(self))]
  pub async fn find_child_category(&self, parent_id: Option<i64>, name: &str) -> Result<Option<CategoryRow>> {
    let category = sqlx::query_as::<_, CategoryRow>(
      r#"
      SELECT id, name, parent_id, is_active
      FROM categories
      WHERE parent_id IS NOT DISTINCT FROM $1 AND LOWER(name) = LOWER($2) AND is_active = TRUE
      LIMIT 1
      "#,
    )
    .bind(parent_id)
    .bind(name)
    .fetch_optional(&self.pool)
    .await?;
    Ok(category)
  }

  #[instrument(skip(self))]
  pub async fn create_category(&self, parent_id: Option<i64>, name: &str) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
      r#"INSERT INTO categories (name, parent_id) VALUES ($1, $2) RETURNING id"#,
    )
    .bind(name)
    .bind(parent_id)
    .fetch_one(&self.pool)
    .await?;
    Ok(id)
  }

  /// Breadcrumb from the root down to `category_id`, e.g. "A > B > C".
  #[instrument(skip(self))]
  pub async fn category_path(&self, category_id: i64) -> Result<Vec<String>> {
    let mut path = Vec::new();
    let mut current = self.get_category(category_id).await?;
    while let Some(category) = current {
      path.push(category.name);
      current = match category.parent_id {
        Some(parent_id) => self.get_category(parent_id).await?,
        None => None,
      };
    }
    path.reverse();
    Ok(path)
  }

  #[instrument(skip(self))]
  pub async fn products_page(&self, category_id: i64, page: u64, per_page: u64) -> Result<(Vec<ProductRow>, u64)> {
    let total = sqlx::query_scalar::<_, i64>(
      r#"SELECT COUNT(*) FROM products WHERE category_id = $1 AND is_active = TRUE"#,
    )
    .bind(category_id)
    .fetch_one(&self.pool)
    .await?;

    let offset = (page.saturating_sub(1) * per_page) as i64;
    let products = sqlx::query_as::<_, ProductRow>(
      r#"
      SELECT id, category_id, name, description, price, photo, is_active
      FROM products
      WHERE category_id = $1 AND is_active = TRUE
      ORDER BY name
      LIMIT $2 OFFSET $3
      "#,
    )
    .bind(category_id)
    .bind(per_page as i64)
    .bind(offset)
    .fetch_all(&self.pool)
    .await?;

    Ok((products, total as u64))
  }

  #[instrument(skip(self))]
  pub async fn get_product(&self, product_id: i64) -> Result<Option<ProductRow>> {
    let product = sqlx::query_as::<_, ProductRow>(
      r#"
      SELECT id, category_id, name, description, price, photo, is_active
      FROM products
      WHERE id = $1 AND is_active = TRUE
      "#,
    )
    .bind(product_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(product)
  }

  #[instrument(skip(self))]
  pub async fn create_product(
    &self,
    category_id: i64,
    name: &str,
    description: &str,
    price: i64,
    photo: Option<&str>,
  ) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
      r#"
      INSERT INTO products (category_id, name, description, price, photo)
      VALUES ($1, $2, $3, $4, $5)
      RETURNING id
      "#,
    )
    .bind(category_id)
    .bind(name)
    .bind(description)
    .bind(price)
    .bind(photo)
    .fetch_one(&self.pool)
    .await?;
    Ok(id)
  }

  /// Flips the soft-delete flag and returns the new state; `None` when the
  /// product is unknown.
  #[instrument(skip(self))]
  pub async fn toggle_product_active(&self, product_id: i64) -> Result<Option<bool>> {
    let active = sqlx::query_scalar::<_, bool>(
      r#"UPDATE products SET is_active = NOT is_active WHERE id = $1 RETURNING is_active"#,
    )
    .bind(product_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(active)
  }

  /// Every product regardless of the active flag, for the admin export.
  #[instrument(skip(self))]
  pub async fn list_all_products(&self) -> Result<Vec<ProductRow>> {
    let products = sqlx::query_as::<_, ProductRow>(
      r#"
      SELECT id, category_id, name, description, price, photo, is_active
      FROM products
      ORDER BY id
      "#,
    )
    .fetch_all(&self.pool)
    .await?;
    Ok(products)
  }
}
