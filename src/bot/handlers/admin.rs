//! Admin panel: recent orders with status changes, product import from an
//! uploaded JSON/CSV file, product and order exports as documents.

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::types::InputFile;
use teloxide::types::MessageId;
use tracing::info;
use tracing::instrument;

use crate::bot::HandlerResult;
use crate::bot::handlers::BotDialogue;
use crate::bot::handlers::CallbackReply;
use crate::bot::handlers::SharedContext;
use crate::bot::handlers::safe_edit_text;
use crate::bot::keyboards;
use crate::bot::state::ConversationState;
use crate::catalog_io;
use crate::catalog_io::FileFormat;
use crate::models::OrderRow;
use crate::models::OrderStatus;
use crate::util::format_kopecks;

const RECENT_ORDERS: i64 = 10;

fn not_admin() -> CallbackReply {
  CallbackReply::toast("🛡 Только для администраторов.")
}

pub(super) async fn show_menu(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  user_id: i64,
) -> anyhow::Result<CallbackReply> {
  if !ctx.is_admin(user_id) {
    return Ok(not_admin());
  }
  safe_edit_text(bot, chat, message_id, "⚙️ Админ-панель", keyboards::admin_menu_keyboard()).await?;
  Ok(CallbackReply::none())
}

pub(super) async fn show_orders(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  user_id: i64,
) -> anyhow::Result<CallbackReply> {
  if !ctx.is_admin(user_id) {
    return Ok(not_admin());
  }
  let orders = ctx.db().list_recent_orders(RECENT_ORDERS).await?;
  let text = if orders.is_empty() {
    "📋 Заказов пока нет.".to_string()
  } else {
    "📋 Последние заказы:".to_string()
  };
  safe_edit_text(bot, chat, message_id, &text, keyboards::admin_orders_keyboard(&orders)).await?;
  Ok(CallbackReply::none())
}

pub(super) async fn show_order(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  user_id: i64,
  order_id: i64,
) -> anyhow::Result<CallbackReply> {
  if !ctx.is_admin(user_id) {
    return Ok(not_admin());
  }
  let Some(order) = ctx.db().get_order(order_id).await? else {
    return Ok(CallbackReply::toast("Заказ не найден."));
  };
  let lines = ctx.db().order_lines(order_id).await?;

  let items = lines
    .iter()
    .map(|line| format!("• {} × {}", line.name, line.quantity))
    .collect::<Vec<_>>()
    .join("\n");
  let text = order_card_text(&order, &items);
  safe_edit_text(bot, chat, message_id, &text, keyboards::order_status_keyboard(order.id)).await?;
  Ok(CallbackReply::none())
}

fn order_card_text(order: &OrderRow, items: &str) -> String {
  let paid = if order.is_paid { "да" } else { "нет" };
  let mut text = format!(
    "📦 Заказ №{} от {}\nПользователь: {}\nСтатус: {}\nОплачен: {paid}\n\n{items}\n\n💰 {}",
    order.id,
    order.created_at.format("%d.%m.%Y %H:%M"),
    order.user_id,
    order.status.label(),
    format_kopecks(order.total),
  );
  text.push_str(&format!("\n\n📍 {}\n📞 {}", order.address, order.phone));
  if let Some(wishes) = order.wishes.as_deref().filter(|w| !w.is_empty()) {
    text.push_str(&format!("\n💬 {wishes}"));
  }
  if let Some(time) = order.desired_delivery_time.as_deref().filter(|t| !t.is_empty()) {
    text.push_str(&format!("\n🕐 {time}"));
  }
  text
}

/// The user is told about the change by the status notifier, not here.
#[instrument(skip(bot, ctx))]
pub(super) async fn set_status(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  user_id: i64,
  order_id: i64,
  status: OrderStatus,
) -> anyhow::Result<CallbackReply> {
  if !ctx.is_admin(user_id) {
    return Ok(not_admin());
  }
  if !ctx.db().set_order_status(order_id, status).await? {
    return Ok(CallbackReply::toast("Заказ не найден."));
  }
  info!(order_id, status = status.as_str(), "order status changed");
  show_order(bot, ctx, chat, message_id, user_id, order_id).await?;
  Ok(CallbackReply::toast(format!("Статус: {}", status.label())))
}

pub(super) async fn export_products(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  user_id: i64,
  csv: bool,
) -> anyhow::Result<CallbackReply> {
  if !ctx.is_admin(user_id) {
    return Ok(not_admin());
  }

  let products = ctx.db().list_all_products().await?;
  let mut records = Vec::with_capacity(products.len());
  for product in &products {
    let path = ctx.db().category_path(product.category_id).await?;
    records.push(catalog_io::export_record(product, &path));
  }

  let (data, filename) = if csv {
    (catalog_io::products_to_csv(&records)?, "products.csv")
  } else {
    (catalog_io::products_to_json(&records)?, "products.json")
  };
  bot
    .send_document(chat, InputFile::memory(data).file_name(filename))
    .await?;
  info!(count = records.len(), filename, "exported products");
  Ok(CallbackReply::none())
}

pub(super) async fn export_orders(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  user_id: i64,
) -> anyhow::Result<CallbackReply> {
  if !ctx.is_admin(user_id) {
    return Ok(not_admin());
  }

  let orders = ctx.db().list_all_orders().await?;
  let mut rows = Vec::with_capacity(orders.len());
  for order in orders {
    let lines = ctx.db().order_lines(order.id).await?;
    rows.push((order, lines));
  }

  let data = catalog_io::orders_to_csv(&rows)?;
  bot
    .send_document(chat, InputFile::memory(data).file_name("orders.csv"))
    .await?;
  info!(count = rows.len(), "exported orders");
  Ok(CallbackReply::none())
}

#[derive(Debug, Clone, Copy)]
pub(super) enum ToggleTarget {
  Product,
  Faq,
}

pub(super) async fn request_toggle(
  bot: &Bot,
  ctx: &SharedContext,
  dialogue: &BotDialogue,
  chat: ChatId,
  user_id: i64,
  target: ToggleTarget,
) -> anyhow::Result<CallbackReply> {
  if !ctx.is_admin(user_id) {
    return Ok(not_admin());
  }
  let (state, prompt) = match target {
    ToggleTarget::Product => (
      ConversationState::TogglingProduct { admin_tg_id: user_id },
      "🗂 Отправьте id товара, чтобы скрыть или вернуть его:",
    ),
    ToggleTarget::Faq => (
      ConversationState::TogglingFaq { admin_tg_id: user_id },
      "🗂 Отправьте id вопроса, чтобы скрыть или вернуть его:",
    ),
  };
  dialogue.update(state).await?;
  bot.send_message(chat, prompt).await?;
  Ok(CallbackReply::none())
}

#[instrument(skip(bot, ctx, dialogue, msg))]
pub(super) async fn handle_toggle_product_message(
  bot: Bot,
  ctx: SharedContext,
  dialogue: BotDialogue,
  admin_tg_id: i64,
  msg: Message,
) -> HandlerResult {
  let Some(id) = toggle_id(&bot, &dialogue, admin_tg_id, &msg).await? else {
    return Ok(());
  };
  let reply = match ctx.db().toggle_product_active(id).await? {
    Some(true) => format!("Товар {id} снова виден в каталоге."),
    Some(false) => format!("Товар {id} скрыт из каталога."),
    None => format!("Товар {id} не найден."),
  };
  dialogue.reset().await?;
  bot.send_message(msg.chat.id, reply).await?;
  Ok(())
}

#[instrument(skip(bot, ctx, dialogue, msg))]
pub(super) async fn handle_toggle_faq_message(
  bot: Bot,
  ctx: SharedContext,
  dialogue: BotDialogue,
  admin_tg_id: i64,
  msg: Message,
) -> HandlerResult {
  let Some(id) = toggle_id(&bot, &dialogue, admin_tg_id, &msg).await? else {
    return Ok(());
  };
  let reply = match ctx.db().toggle_faq_active(id).await? {
    Some(true) => format!("Вопрос {id} снова виден в FAQ."),
    Some(false) => format!("Вопрос {id} скрыт из FAQ."),
    None => format!("Вопрос {id} не найден."),
  };
  dialogue.reset().await?;
  bot.send_message(msg.chat.id, reply).await?;
  Ok(())
}

/// Shared id parsing for the two toggle conversations; "отмена" resets.
async fn toggle_id(bot: &Bot, dialogue: &BotDialogue, admin_tg_id: i64, msg: &Message) -> anyhow::Result<Option<i64>> {
  let sender = msg.from.as_ref().map(|user| user.id.0 as i64);
  if sender != Some(admin_tg_id) {
    return Ok(None);
  }
  let Some(text) = msg.text().map(str::trim) else {
    bot.send_message(msg.chat.id, "Отправьте числовой id, либо «отмена».").await?;
    return Ok(None);
  };
  if text.to_lowercase() == "отмена" {
    dialogue.reset().await?;
    bot.send_message(msg.chat.id, "Действие отменено.").await?;
    return Ok(None);
  }
  match text.parse::<i64>() {
    Ok(id) => Ok(Some(id)),
    Err(_) => {
      bot.send_message(msg.chat.id, "Отправьте числовой id, либо «отмена».").await?;
      Ok(None)
    },
  }
}

pub(super) async fn request_import(
  bot: &Bot,
  ctx: &SharedContext,
  dialogue: &BotDialogue,
  chat: ChatId,
  user_id: i64,
) -> anyhow::Result<CallbackReply> {
  if !ctx.is_admin(user_id) {
    return Ok(not_admin());
  }
  dialogue
    .update(ConversationState::AwaitingImport { admin_tg_id: user_id })
    .await?;
  bot
    .send_message(
      chat,
      "📥 Пришлите файл .json или .csv с колонками name, description, price, \
       category_path, photo_filename. Сообщение «отмена» прервёт импорт.",
    )
    .await?;
  Ok(CallbackReply::none())
}

#[instrument(skip(bot, ctx, dialogue, msg))]
pub(super) async fn handle_import_message(
  bot: Bot,
  ctx: SharedContext,
  dialogue: BotDialogue,
  admin_tg_id: i64,
  msg: Message,
) -> HandlerResult {
  let chat = msg.chat.id;
  let sender = msg.from.as_ref().map(|user| user.id.0 as i64);
  if sender != Some(admin_tg_id) {
    return Ok(());
  }

  if let Some(text) = msg.text() {
    if text.trim().to_lowercase() == "отмена" {
      dialogue.reset().await?;
      bot.send_message(chat, "Импорт отменён.").await?;
    } else {
      bot.send_message(chat, "Жду файл .json или .csv, либо «отмена».").await?;
    }
    return Ok(());
  }

  let Some(document) = msg.document() else {
    bot.send_message(chat, "Жду файл .json или .csv, либо «отмена».").await?;
    return Ok(());
  };
  let filename = document.file_name.as_deref().unwrap_or("");
  let Some(format) = FileFormat::from_filename(filename) else {
    bot
      .send_message(chat, "Поддерживаются только файлы .json и .csv.")
      .await?;
    return Ok(());
  };

  let file = bot.get_file(document.file.id.clone()).await?;
  let mut data = Vec::new();
  bot.download_file(&file.path, &mut data).await?;

  let records = match catalog_io::parse_products(format, &data) {
    Ok(records) => records,
    Err(err) => {
      bot.send_message(chat, format!("Не удалось разобрать файл: {err}")).await?;
      return Ok(());
    },
  };

  let report = catalog_io::import_products(ctx.db(), ctx.media_root(), &records).await?;
  dialogue.reset().await?;
  bot.send_message(chat, report.summary()).await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use chrono::Utc;

  use super::order_card_text;
  use crate::models::OrderRow;
  use crate::models::OrderStatus;

  #[test]
  fn order_card_includes_optional_fields_when_present() {
    let order = OrderRow {
      id: 7,
      user_id: 42,
      address: "Невский 1".to_string(),
      phone: "+79991234567".to_string(),
      wishes: Some("Позвонить заранее".to_string()),
      desired_delivery_time: Some(String::new()),
      total: 25000,
      status: OrderStatus::Assembling,
      notified_status: OrderStatus::Accepted,
      is_paid: false,
      payment_id: None,
      is_active: true,
      created_at: Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap(),
    };
    let text = order_card_text(&order, "• Роза × 2");
    assert!(text.contains("Заказ №7"));
    assert!(text.contains("Собирается"));
    assert!(text.contains("Позвонить заранее"));
    assert!(!text.contains("🕐"));
  }
}
