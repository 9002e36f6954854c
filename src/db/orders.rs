use anyhow::Result;
use anyhow::bail;
use tracing::instrument;

use crate::db::Db;
use crate::models::OrderLine;
use crate::models::OrderRow;
use crate::models::OrderStatus;

const ORDER_COLUMNS: &str = "id, user_id, address, phone, wishes, desired_delivery_time, total, \
                             status, notified_status, is_paid, payment_id, is_active, created_at";

impl Db {
  /// Converts the user's active cart into an order: sums the total over
  /// active lines, copies them into order items and deactivates the cart.
  /// Sequential writes, no transaction; a crash mid-way is an accepted risk.
  #[instrument(skip(self, address, phone, wishes, desired_delivery_time))]
  pub async fn create_order_from_cart(
    &self,
    user_id: i64,
    address: &str,
    phone: &str,
    wishes: Option<&str>,
    desired_delivery_time: Option<&str>,
  ) -> Result<OrderRow> {
    let lines = self.cart_lines(user_id).await?;
    if lines.is_empty() {
      bail!("cart is empty");
    }
    let total: i64 = lines.iter().map(|line| line.line_total()).sum();

    let order = sqlx::query_as::<_, OrderRow>(&format!(
      r#"
      INSERT INTO orders (user_id, address, phone, wishes, desired_delivery_time, total)
      VALUES ($1, $2, $3, $4, $5, $6)
      RETURNING {ORDER_COLUMNS}
      "#,
    ))
    .bind(user_id)
    .bind(address)
    .bind(phone)
    .bind(wishes)
    .bind(desired_delivery_time)
    .bind(total)
    .fetch_one(&self.pool)
    .await?;

    for line in &lines {
      sqlx::query(r#"INSERT INTO order_items (order_id, product_id, quantity) VALUES ($1, $2, $3)"#)
        .bind(order.id)
        .bind(line.product_id)
        .bind(line.quantity)
        .execute(&self.pool)
        .await?;
    }

    self.clear_cart(user_id).await?;
    Ok(order)
  }

  /// The order as seen by its owner; other users' ids come back as `None`.
  #[instrument(skip(self))]
  pub async fn get_user_order(&self, order_id: i64, user_id: i64) -> Result<Option<OrderRow>> {
    let order = sqlx::query_as::<_, OrderRow>(&format!(
      r#"SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2 AND is_active = TRUE"#,
    ))
    .bind(order_id)
    .bind(user_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(order)
  }

  #[instrument(skip(self))]
  pub async fn get_order(&self, order_id: i64) -> Result<Option<OrderRow>> {
    let order = sqlx::query_as::<_, OrderRow>(&format!(
      r#"SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND is_active = TRUE"#,
    ))
    .bind(order_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(order)
  }

  /// Order items joined with products; prices are live, not frozen.
  #[instrument(skip(self))]
  pub async fn order_lines(&self, order_id: i64) -> Result<Vec<OrderLine>> {
    let lines = sqlx::query_as::<_, OrderLine>(
      r#"
      SELECT oi.product_id, p.name, p.price, oi.quantity
      FROM order_items oi
      INNER JOIN products p ON p.id = oi.product_id
      WHERE oi.order_id = $1
      ORDER BY oi.id
      "#,
    )
    .bind(order_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(lines)
  }

  #[instrument(skip(self))]
  pub async fn list_user_orders(&self, user_id: i64, limit: i64) -> Result<Vec<OrderRow>> {
    let orders = sqlx::query_as::<_, OrderRow>(&format!(
      r#"
      SELECT {ORDER_COLUMNS} FROM orders
      WHERE user_id = $1 AND is_active = TRUE
      ORDER BY created_at DESC
      LIMIT $2
      "#,
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(&self.pool)
    .await?;
    Ok(orders)
  }

  #[instrument(skip(self))]
  pub async fn list_recent_orders(&self, limit: i64) -> Result<Vec<OrderRow>> {
    let orders = sqlx::query_as::<_, OrderRow>(&format!(
      r#"
      SELECT {ORDER_COLUMNS} FROM orders
      WHERE is_active = TRUE
      ORDER BY created_at DESC
      LIMIT $1
      "#,
    ))
    .bind(limit)
    .fetch_all(&self.pool)
    .await?;
    Ok(orders)
  }

  /// Every order regardless of the active flag, for the admin export.
  #[instrument(skip(self))]
  pub async fn list_all_orders(&self) -> Result<Vec<OrderRow>> {
    let orders = sqlx::query_as::<_, OrderRow>(&format!(r#"SELECT {ORDER_COLUMNS} FROM orders ORDER BY id"#))
      .fetch_all(&self.pool)
      .await?;
    Ok(orders)
  }

  #[instrument(skip(self))]
  pub async fn set_order_status(&self, order_id: i64, status: OrderStatus) -> Result<bool> {
    let result = sqlx::query(r#"UPDATE orders SET status = $2 WHERE id = $1 AND is_active = TRUE"#)
      .bind(order_id)
      .bind(status)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() > 0)
  }

  #[instrument(skip(self))]
  pub async fn set_order_payment_id(&self, order_id: i64, payment_id: Option<&str>) -> Result<()> {
    sqlx::query(r#"UPDATE orders SET payment_id = $2 WHERE id = $1"#)
      .bind(order_id)
      .bind(payment_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  #[instrument(skip(self))]
  pub async fn mark_order_paid(&self, order_id: i64) -> Result<()> {
    sqlx::query(r#"UPDATE orders SET is_paid = TRUE WHERE id = $1"#)
      .bind(order_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  /// Orders whose status changed since the user was last told about it.
  #[instrument(skip(self))]
  pub async fn orders_with_unnotified_status(&self) -> Result<Vec<OrderRow>> {
    let orders = sqlx::query_as::<_, OrderRow>(&format!(
      r#"
      SELECT {ORDER_COLUMNS} FROM orders
      WHERE status IS DISTINCT FROM notified_status AND is_active = TRUE
      ORDER BY id
      "#,
    ))
    .fetch_all(&self.pool)
    .await?;
    Ok(orders)
  }

  #[instrument(skip(self))]
  pub async fn mark_status_notified(&self, order_id: i64, status: OrderStatus) -> Result<()> {
    sqlx::query(r#"UPDATE orders SET notified_status = $2 WHERE id = $1"#)
      .bind(order_id)
      .bind(status)
      .execute(&self.pool)
      .await?;
    Ok(())
  }
}
