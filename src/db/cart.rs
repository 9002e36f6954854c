use anyhow::Result;
use tracing::instrument;

use crate::db::Db;
use crate::models::CartLine;
use crate::models::CartRow;

impl Db {
  /// The user's single active cart, created on demand.
  #[instrument(skip(self))]
  pub async fn get_or_create_cart(&self, user_id: i64) -> Result<CartRow> {
    if let Some(cart) = self.active_cart(user_id).await? {
      return Ok(cart);
    }
    let cart = sqlx::query_as::<_, CartRow>(
      r#"INSERT INTO carts (user_id) VALUES ($1) RETURNING id, user_id, is_active"#,
    )
    .bind(user_id)
    .fetch_one(&self.pool)
    .await?;
    Ok(cart)
  }

  #[instrument(skip(self))]
  pub async fn active_cart(&self, user_id: i64) -> Result<Option<CartRow>> {
    let cart = sqlx::query_as::<_, CartRow>(
      r#"
      SELECT id, user_id, is_active
      FROM carts
      WHERE user_id = $1 AND is_active = TRUE
      ORDER BY id DESC
      LIMIT 1
      "#,
    )
    .bind(user_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(cart)
  }

  /// Active items of the user's active cart, joined with their products.
  #[instrument(skip(self))]
  pub async fn cart_lines(&self, user_id: i64) -> Result<Vec<CartLine>> {
    let lines = sqlx::query_as::<_, CartLine>(
      r#"
      SELECT ci.product_id, p.name, p.price, ci.quantity
      FROM cart_items ci
      INNER JOIN carts c ON c.id = ci.cart_id
      INNER JOIN products p ON p.id = ci.product_id
      WHERE c.user_id = $1 AND c.is_active = TRUE AND ci.is_active = TRUE
      ORDER BY ci.id
      "#,
    )
    .bind(user_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(lines)
  }

  /// Create-or-increment: a fresh row at quantity 1, or +1 on the existing
  /// active row for the same product.
  #[instrument(skip(self))]
  pub async fn add_to_cart(&self, user_id: i64, product_id: i64) -> Result<()> {
    let cart = self.get_or_create_cart(user_id).await?;
    let existing = sqlx::query_scalar::<_, i64>(
      r#"
      SELECT id FROM cart_items
      WHERE cart_id = $1 AND product_id = $2 AND is_active = TRUE
      LIMIT 1
      "#,
    )
    .bind(cart.id)
    .bind(product_id)
    .fetch_optional(&self.pool)
    .await?;

    match existing {
      Some(item_id) => {
        sqlx::query(r#"UPDATE cart_items SET quantity = quantity + 1 WHERE id = $1"#)
          .bind(item_id)
          .execute(&self.pool)
          .await?;
      },
      None => {
        sqlx::query(r#"INSERT INTO cart_items (cart_id, product_id, quantity) VALUES ($1, $2, 1)"#)
          .bind(cart.id)
          .bind(product_id)
          .execute(&self.pool)
          .await?;
      },
    }
    Ok(())
  }

  /// Adjusts an item's quantity by `delta`. Dropping to zero soft-deletes the
  /// item; a cart left without active items is deactivated.
  #[instrument(skip(self))]
  pub async fn change_cart_quantity(&self, user_id: i64, product_id: i64, delta: i32) -> Result<()> {
    let Some(cart) = self.active_cart(user_id).await? else {
      return Ok(());
    };

    let item = sqlx::query_as::<_, (i64, i32)>(
      r#"
      SELECT id, quantity FROM cart_items
      WHERE cart_id = $1 AND product_id = $2 AND is_active = TRUE
      LIMIT 1
      "#,
    )
    .bind(cart.id)
    .bind(product_id)
    .fetch_optional(&self.pool)
    .await?;

    if let Some((item_id, quantity)) = item {
      let new_quantity = quantity + delta;
      if new_quantity <= 0 {
        sqlx::query(r#"UPDATE cart_items SET is_active = FALSE WHERE id = $1"#)
          .bind(item_id)
          .execute(&self.pool)
          .await?;
      } else {
        sqlx::query(r#"UPDATE cart_items SET quantity = $2 WHERE id = $1"#)
          .bind(item_id)
          .bind(new_quantity)
          .execute(&self.pool)
          .await?;
      }
    }

    self.deactivate_cart_if_empty(cart.id).await
  }

  #[instrument(skip(self))]
  pub async fn remove_from_cart(&self, user_id: i64, product_id: i64) -> Result<()> {
    let Some(cart) = self.active_cart(user_id).await? else {
      return Ok(());
    };
    sqlx::query(
      r#"UPDATE cart_items SET is_active = FALSE WHERE cart_id = $1 AND product_id = $2 AND is_active = TRUE"#,
    )
    .bind(cart.id)
    .bind(product_id)
    .execute(&self.pool)
    .await?;
    self.deactivate_cart_if_empty(cart.id).await
  }

  #[instrument(skip(self))]
  pub async fn clear_cart(&self, user_id: i64) -> Result<()> {
    let Some(cart) = self.active_cart(user_id).await? else {
      return Ok(());
    };
    sqlx::query(r#"UPDATE cart_items SET is_active = FALSE WHERE cart_id = $1 AND is_active = TRUE"#)
      .bind(cart.id)
      .execute(&self.pool)
      .await?;
    sqlx::query(r#"UPDATE carts SET is_active = FALSE WHERE id = $1"#)
      .bind(cart.id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn deactivate_cart_if_empty(&self, cart_id: i64) -> Result<()> {
    let remaining = sqlx::query_scalar::<_, i64>(
      r#"SELECT COUNT(*) FROM cart_items WHERE cart_id = $1 AND is_active = TRUE"#,
    )
    .bind(cart_id)
    .fetch_one(&self.pool)
    .await?;
    if remaining == 0 {
      sqlx::query(r#"UPDATE carts SET is_active = FALSE WHERE id = $1"#)
        .bind(cart_id)
        .execute(&self.pool)
        .await?;
    }
    Ok(())
  }
}
