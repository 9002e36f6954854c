//! Background task that tells customers about order status changes. The
//! admin panel only writes the new status; this loop picks up orders whose
//! status differs from the last one announced and sends the message.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::info;
use tracing::warn;

use crate::db::Db;
use crate::util::format_kopecks;

const POLL_INTERVAL: Duration = Duration::from_secs(15);

pub fn spawn(bot: Bot, db: Db) -> tokio::task::JoinHandle<()> {
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
      ticker.tick().await;
      if let Err(err) = notify_pending(&bot, &db).await {
        warn!(error = %err, "status notification pass failed");
      }
    }
  })
}

async fn notify_pending(bot: &Bot, db: &Db) -> anyhow::Result<()> {
  let orders = db.orders_with_unnotified_status().await?;
  for order in orders {
    match bot.send_message(ChatId(order.user_id), notification_text(&order)).await {
      Ok(_) => {
        info!(order_id = order.id, status = order.status.as_str(), "notified status change");
      },
      Err(err) => {
        warn!(order_id = order.id, error = %err, "could not deliver status notification, giving up");
      },
    }
    // One attempt per status change: a blocked bot or deleted chat gets
    // the warning above and the status still counts as announced.
    db.mark_status_notified(order.id, order.status).await?;
  }
  Ok(())
}

fn notification_text(order: &crate::models::OrderRow) -> String {
  format!(
    "📦 Заказ №{} на {} — новый статус: {}.",
    order.id,
    format_kopecks(order.total),
    order.status.label()
  )
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use chrono::Utc;

  use super::notification_text;
  use crate::models::OrderRow;
  use crate::models::OrderStatus;

  #[test]
  fn announcement_names_order_total_and_status() {
    let order = OrderRow {
      id: 7,
      user_id: 1,
      address: "Невский 1".to_string(),
      phone: "+79991234567".to_string(),
      wishes: None,
      desired_delivery_time: None,
      total: 25000,
      status: OrderStatus::OnWay,
      notified_status: OrderStatus::Accepted,
      is_paid: true,
      payment_id: None,
      is_active: true,
      created_at: Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap(),
    };
    let text = notification_text(&order);
    assert!(text.contains("№7"));
    assert!(text.contains("250.00 ₽"));
    assert!(text.contains("В пути"));
  }
}
