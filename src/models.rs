use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRow {
  pub id: i64, // tg id
  pub username: Option<String>,
  pub first_name: Option<String>,
  pub last_name: Option<String>,
  pub language_code: Option<String>,
  pub is_active: bool,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryRow {
  pub id: i64,
  pub name: String,
  pub parent_id: Option<i64>,
  pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductRow {
  pub id: i64,
  pub category_id: i64,
  pub name: String,
  pub description: String,
  pub price: i64, // kopecks
  pub photo: Option<String>,
  pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartRow {
  pub id: i64,
  pub user_id: i64,
  pub is_active: bool,
}

/// One active cart item joined with its product, as shown in the cart view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartLine {
  pub product_id: i64,
  pub name: String,
  pub price: i64, // kopecks
  pub quantity: i32,
}

impl CartLine {
  pub fn line_total(&self) -> i64 {
    self.price * i64::from(self.quantity)
  }
}

/// Derives cart quantity and grand total from active lines only.
pub fn cart_totals(lines: &[CartLine]) -> (i64, i64) {
  let quantity = lines.iter().map(|line| i64::from(line.quantity)).sum();
  let total = lines.iter().map(CartLine::line_total).sum();
  (quantity, total)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  Accepted,
  Assembling,
  OnWay,
  Delivered,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 4] = [Self::Accepted, Self::Assembling, Self::OnWay, Self::Delivered];

  pub fn label(self) -> &'static str {
    match self {
      Self::Accepted => "Принят",
      Self::Assembling => "Собирается",
      Self::OnWay => "В пути",
      Self::Delivered => "Доставлен",
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Accepted => "accepted",
      Self::Assembling => "assembling",
      Self::OnWay => "on_way",
      Self::Delivered => "delivered",
    }
  }

  pub fn parse(value: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|status| status.as_str() == value)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderRow {
  pub id: i64,
  pub user_id: i64,
  pub address: String,
  pub phone: String,
  pub wishes: Option<String>,
  pub desired_delivery_time: Option<String>,
  pub total: i64, // kopecks
  pub status: OrderStatus,
  pub notified_status: OrderStatus,
  pub is_paid: bool,
  pub payment_id: Option<String>,
  pub is_active: bool,
  pub created_at: DateTime<Utc>,
}

/// One order item joined with its product. The price is read live from the
/// product, not frozen at order creation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderLine {
  pub product_id: i64,
  pub name: String,
  pub price: i64, // kopecks
  pub quantity: i32,
}

impl OrderLine {
  pub fn line_total(&self) -> i64 {
    self.price * i64::from(self.quantity)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FaqRow {
  pub id: i64,
  pub question: String,
  pub answer: String,
  pub is_active: bool,
}

#[cfg(test)]
mod tests {
  use super::CartLine;
  use super::OrderStatus;
  use super::cart_totals;

  fn line(product_id: i64, price: i64, quantity: i32) -> CartLine {
    CartLine {
      product_id,
      name: format!("product {product_id}"),
      price,
      quantity,
    }
  }

  #[test]
  fn totals_sum_price_times_quantity() {
    let lines = vec![line(1, 10000, 2), line(2, 5000, 1)];
    let (quantity, total) = cart_totals(&lines);
    assert_eq!(quantity, 3);
    assert_eq!(total, 25000);
  }

  #[test]
  fn totals_after_removing_a_line() {
    let mut lines = vec![line(1, 10000, 2), line(2, 5000, 1)];
    lines.retain(|l| l.product_id != 2);
    let (quantity, total) = cart_totals(&lines);
    assert_eq!(quantity, 2);
    assert_eq!(total, 20000);
    assert_eq!(lines.len(), 1);
  }

  #[test]
  fn empty_cart_totals_are_zero() {
    assert_eq!(cart_totals(&[]), (0, 0));
  }

  #[test]
  fn status_round_trips_through_str() {
    for status in OrderStatus::ALL {
      assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(OrderStatus::parse("unknown"), None);
  }
}
