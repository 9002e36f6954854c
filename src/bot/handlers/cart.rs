use anyhow::Context;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::types::MessageId;
use tracing::instrument;

use crate::bot::HandlerResult;
use crate::bot::handlers::CallbackReply;
use crate::bot::handlers::SharedContext;
use crate::bot::handlers::ensure_user_record;
use crate::bot::handlers::safe_edit_text;
use crate::bot::keyboards;
use crate::models::CartLine;
use crate::models::cart_totals;
use crate::util::clamp_page;
use crate::util::format_kopecks;
use crate::util::total_pages;

#[instrument(skip(bot, ctx, msg))]
pub(super) async fn handle_cart_command(bot: Bot, ctx: SharedContext, msg: Message) -> HandlerResult {
  let user = msg.from.as_ref().context("message missing sender")?;
  ensure_user_record(&ctx, user).await?;
  let user_id = user.id.0 as i64;

  let (text, keyboard) = cart_view(&ctx, user_id, 1).await?;
  bot.send_message(msg.chat.id, text).reply_markup(keyboard).await?;
  Ok(())
}

pub(super) async fn show_cart(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  user_id: i64,
  page: u64,
) -> HandlerResult {
  let (text, keyboard) = cart_view(ctx, user_id, page).await?;
  safe_edit_text(bot, chat, message_id, &text, keyboard).await
}

async fn cart_view(
  ctx: &SharedContext,
  user_id: i64,
  page: u64,
) -> anyhow::Result<(String, teloxide::types::InlineKeyboardMarkup)> {
  let lines = ctx.db().cart_lines(user_id).await?;
  let per_page = ctx.pages().cart_items;
  let pages = total_pages(lines.len() as u64, per_page);
  let page = clamp_page(page, pages);

  let start = ((page - 1) * per_page) as usize;
  let page_lines = lines.iter().skip(start).take(per_page as usize).cloned().collect::<Vec<_>>();

  let text = cart_text(&lines, &page_lines);
  let keyboard = keyboards::cart_keyboard(&page_lines, page, pages);
  Ok((text, keyboard))
}

/// The message lists the same slice the keyboard paginates; the footer
/// still totals the whole cart.
fn cart_text(lines: &[CartLine], page_lines: &[CartLine]) -> String {
  if lines.is_empty() {
    return "🛒 Корзина пуста.".to_string();
  }
  let (quantity, total) = cart_totals(lines);
  let mut text = String::from("🛒 Корзина:\n");
  for line in page_lines {
    text.push_str(&format!(
      "\n• {} — {} × {} = {}",
      line.name,
      format_kopecks(line.price),
      line.quantity,
      format_kopecks(line.line_total())
    ));
  }
  text.push_str(&format!("\n\nВсего: {quantity} шт на {}", format_kopecks(total)));
  text
}

pub(super) async fn add_to_cart(ctx: &SharedContext, user_id: i64, product_id: i64) -> anyhow::Result<CallbackReply> {
  let Some(product) = ctx.db().get_product(product_id).await? else {
    return Ok(CallbackReply::toast("Товар больше не доступен."));
  };
  ctx.db().add_to_cart(user_id, product_id).await?;
  Ok(CallbackReply::toast(format!("✅ «{}» в корзине", product.name)))
}

pub(super) async fn change_quantity(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  user_id: i64,
  product_id: i64,
  delta: i32,
) -> anyhow::Result<CallbackReply> {
  ctx.db().change_cart_quantity(user_id, product_id, delta).await?;
  show_cart(bot, ctx, chat, message_id, user_id, 1).await?;
  Ok(CallbackReply::none())
}

pub(super) async fn remove_item(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  user_id: i64,
  product_id: i64,
) -> anyhow::Result<CallbackReply> {
  ctx.db().remove_from_cart(user_id, product_id).await?;
  show_cart(bot, ctx, chat, message_id, user_id, 1).await?;
  Ok(CallbackReply::toast("Товар удалён из корзины."))
}

pub(super) async fn clear_cart(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  user_id: i64,
) -> anyhow::Result<CallbackReply> {
  ctx.db().clear_cart(user_id).await?;
  show_cart(bot, ctx, chat, message_id, user_id, 1).await?;
  Ok(CallbackReply::toast("Корзина очищена."))
}

#[cfg(test)]
mod tests {
  use super::cart_text;
  use crate::models::CartLine;

  fn line(name: &str, price: i64, quantity: i32) -> CartLine {
    CartLine {
      product_id: 1,
      name: name.to_string(),
      price,
      quantity,
    }
  }

  #[test]
  fn empty_cart_text() {
    assert_eq!(cart_text(&[], &[]), "🛒 Корзина пуста.");
  }

  #[test]
  fn cart_text_sums_lines() {
    let lines = vec![line("Роза", 10000, 2), line("Тюльпан", 5000, 1)];
    let text = cart_text(&lines, &lines);
    assert!(text.contains("100.00 ₽ × 2 = 200.00 ₽"));
    assert!(text.contains("Всего: 3 шт на 250.00 ₽"));
  }

  #[test]
  fn later_pages_list_only_their_slice_but_total_everything() {
    let lines = vec![line("Роза", 10000, 2), line("Тюльпан", 5000, 1)];
    let text = cart_text(&lines, &lines[1..]);
    assert!(!text.contains("Роза"));
    assert!(text.contains("Тюльпан"));
    assert!(text.contains("Всего: 3 шт на 250.00 ₽"));
  }
}
