use anyhow::Context;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::types::MessageId;
use tracing::instrument;

use crate::bot::HandlerResult;
use crate::bot::handlers::SharedContext;
use crate::bot::handlers::ensure_user_record;
use crate::bot::handlers::safe_edit_text;
use crate::bot::keyboards;
use crate::models::OrderRow;
use crate::models::UserRow;
use crate::util::format_kopecks;

const RECENT_ORDERS: i64 = 5;

#[instrument(skip(bot, ctx, msg))]
pub(super) async fn handle_profile_command(bot: Bot, ctx: SharedContext, msg: Message) -> HandlerResult {
  let user = msg.from.as_ref().context("message missing sender")?;
  ensure_user_record(&ctx, user).await?;
  let user_id = user.id.0 as i64;

  let text = profile_view(&ctx, user_id).await?;
  bot
    .send_message(msg.chat.id, text)
    .reply_markup(keyboards::profile_keyboard())
    .await?;
  Ok(())
}

pub(super) async fn show_profile(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  user_id: i64,
) -> HandlerResult {
  let text = profile_view(ctx, user_id).await?;
  safe_edit_text(bot, chat, message_id, &text, keyboards::profile_keyboard()).await
}

async fn profile_view(ctx: &SharedContext, user_id: i64) -> anyhow::Result<String> {
  let user = ctx.db().get_user(user_id).await?;
  let orders = ctx.db().list_user_orders(user_id, RECENT_ORDERS).await?;
  Ok(profile_text(user.as_ref(), &orders))
}

fn profile_text(user: Option<&UserRow>, orders: &[OrderRow]) -> String {
  let mut text = String::from("👤 Профиль\n");
  if let Some(user) = user {
    if let Some(username) = user.username.as_deref() {
      text.push_str(&format!("@{username}\n"));
    }
    text.push_str(&format!("С нами с {}\n", user.created_at.format("%d.%m.%Y")));
  }

  if orders.is_empty() {
    text.push_str("\nЗаказов пока нет.");
    return text;
  }

  text.push_str("\n📦 Последние заказы:");
  for order in orders {
    let paid = if order.is_paid { "оплачен" } else { "не оплачен" };
    text.push_str(&format!(
      "\n№{} от {} — {} ({}, {paid})\n  📍 {}",
      order.id,
      order.created_at.format("%d.%m.%Y"),
      format_kopecks(order.total),
      order.status.label(),
      order.address,
    ));
  }
  text
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use chrono::Utc;

  use super::profile_text;
  use crate::models::OrderRow;
  use crate::models::OrderStatus;

  fn order(id: i64, total: i64, status: OrderStatus, is_paid: bool) -> OrderRow {
    OrderRow {
      id,
      user_id: 1,
      address: "Невский 1".to_string(),
      phone: "+79991234567".to_string(),
      wishes: None,
      desired_delivery_time: None,
      total,
      status,
      notified_status: status,
      is_paid,
      payment_id: None,
      is_active: true,
      created_at: Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap(),
    }
  }

  #[test]
  fn empty_profile_mentions_no_orders() {
    let text = profile_text(None, &[]);
    assert!(text.contains("Заказов пока нет."));
  }

  #[test]
  fn lists_orders_with_status_and_payment() {
    let orders = vec![order(3, 25000, OrderStatus::OnWay, true)];
    let text = profile_text(None, &orders);
    assert!(text.contains("№3"));
    assert!(text.contains("250.00 ₽"));
    assert!(text.contains("В пути"));
    assert!(text.contains("оплачен"));
  }
}
