use anyhow::Context;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::types::InputFile;
use teloxide::types::MessageId;
use tracing::instrument;

use crate::bot::HandlerResult;
use crate::bot::callback::CallbackAction;
use crate::bot::handlers::CallbackReply;
use crate::bot::handlers::SharedContext;
use crate::bot::handlers::delete_quietly;
use crate::bot::handlers::ensure_user_record;
use crate::bot::handlers::safe_edit_text;
use crate::bot::keyboards;
use crate::models::CategoryRow;
use crate::models::ProductRow;
use crate::util::clamp_page;
use crate::util::format_kopecks;
use crate::util::total_pages;

#[instrument(skip(bot, ctx, msg))]
pub(super) async fn handle_catalog_command(bot: Bot, ctx: SharedContext, msg: Message) -> HandlerResult {
  let user = msg.from.as_ref().context("message missing sender")?;
  ensure_user_record(&ctx, user).await?;
  let (text, categories, parent, page, pages) = category_page_view(&ctx, None, 1).await?;
  let keyboard = keyboards::categories_keyboard(&categories, parent, page, pages, CallbackAction::MainMenu);
  bot.send_message(msg.chat.id, text).reply_markup(keyboard).await?;
  Ok(())
}

async fn category_page_view(
  ctx: &SharedContext,
  parent: Option<i64>,
  page: u64,
) -> anyhow::Result<(String, Vec<CategoryRow>, Option<i64>, u64, u64)> {
  let per_page = ctx.pages().categories;
  let (mut categories, total) = ctx.db().categories_page(parent, page, per_page).await?;
  let pages = total_pages(total, per_page);
  let page = clamp_page(page, pages);
  if categories.is_empty() && total > 0 {
    // Asked past the end, e.g. a stale button after items were removed.
    (categories, _) = ctx.db().categories_page(parent, page, per_page).await?;
  }

  let path = match parent {
    None => None,
    Some(parent_id) => Some(ctx.db().category_path(parent_id).await?.join(" > ")),
  };
  let text = category_list_text(path.as_deref(), categories.is_empty());
  Ok((text, categories, parent, page, pages))
}

fn category_list_text(path: Option<&str>, is_empty: bool) -> String {
  match (path, is_empty) {
    (None, true) => "🛍 Каталог пока пуст.".to_string(),
    (None, false) => "🛍 Каталог\nВыберите категорию:".to_string(),
    (Some(path), true) => format!("🛍 {path}\nЗдесь пока нет подкатегорий."),
    (Some(path), false) => format!("🛍 {path}\nВыберите подкатегорию:"),
  }
}

pub(super) async fn show_category_list(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  parent: Option<i64>,
  page: u64,
) -> HandlerResult {
  let (text, categories, parent, page, pages) = category_page_view(ctx, parent, page).await?;
  let back = match parent {
    None => CallbackAction::MainMenu,
    Some(parent_id) => {
      let grandparent = ctx
        .db()
        .get_category(parent_id)
        .await?
        .and_then(|category| category.parent_id);
      CallbackAction::CategoryList {
        parent: grandparent,
        page: 1,
      }
    },
  };
  let keyboard = keyboards::categories_keyboard(&categories, parent, page, pages, back);
  safe_edit_text(bot, chat, message_id, &text, keyboard).await
}

/// A category with children opens as a subcategory list, a leaf as its
/// product list.
pub(super) async fn open_category(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  category_id: i64,
  page: u64,
) -> anyhow::Result<CallbackReply> {
  let Some(_category) = ctx.db().get_category(category_id).await? else {
    return Ok(CallbackReply::toast("Категория больше не доступна."));
  };

  let (_, children_total) = ctx.db().categories_page(Some(category_id), 1, 1).await?;
  if children_total > 0 {
    show_category_list(bot, ctx, chat, message_id, Some(category_id), page).await?;
    return Ok(CallbackReply::none());
  }
  show_product_list(bot, ctx, chat, message_id, category_id, page).await
}

pub(super) async fn show_product_list(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  category_id: i64,
  page: u64,
) -> anyhow::Result<CallbackReply> {
  let Some(category) = ctx.db().get_category(category_id).await? else {
    return Ok(CallbackReply::toast("Категория больше не доступна."));
  };

  let per_page = ctx.pages().products;
  let (mut products, total) = ctx.db().products_page(category_id, page, per_page).await?;
  let pages = total_pages(total, per_page);
  let page = clamp_page(page, pages);
  if products.is_empty() && total > 0 {
    (products, _) = ctx.db().products_page(category_id, page, per_page).await?;
  }

  let path = ctx.db().category_path(category_id).await?;
  let text = if products.is_empty() {
    format!("🛍 {}\nВ этой категории пока нет товаров.", path.join(" > "))
  } else {
    format!("🛍 {}\nВыберите товар:", path.join(" > "))
  };
  let back = CallbackAction::CategoryList {
    parent: category.parent_id,
    page: 1,
  };
  let keyboard = keyboards::products_keyboard(&products, category_id, page, pages, back);
  safe_edit_text(bot, chat, message_id, &text, keyboard).await?;
  Ok(CallbackReply::none())
}

fn product_card_text(product: &ProductRow) -> String {
  let mut text = format!("{}\n\n💰 {}", product.name, format_kopecks(product.price));
  if !product.description.is_empty() {
    text.push_str("\n\n");
    text.push_str(&product.description);
  }
  text
}

/// Product card replaces the list message: photo products become a photo
/// message, so the list message is deleted rather than edited.
pub(super) async fn show_product(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  product_id: i64,
) -> anyhow::Result<CallbackReply> {
  let Some(product) = ctx.db().get_product(product_id).await? else {
    return Ok(CallbackReply::toast("Товар больше не доступен."));
  };

  let text = product_card_text(&product);
  let keyboard = keyboards::product_keyboard(product.id, product.category_id, 1);

  let photo_path = product
    .photo
    .as_deref()
    .map(|filename| ctx.media_root().join(filename))
    .filter(|path| path.is_file());

  match photo_path {
    Some(path) => {
      delete_quietly(bot, chat, message_id).await;
      bot
        .send_photo(chat, InputFile::file(path))
        .caption(text)
        .reply_markup(keyboard)
        .await?;
    },
    None => {
      safe_edit_text(bot, chat, message_id, &text, keyboard).await?;
    },
  }
  Ok(CallbackReply::none())
}

#[cfg(test)]
mod tests {
  use super::category_list_text;
  use super::product_card_text;
  use crate::models::ProductRow;

  fn product(name: &str, price: i64, description: &str) -> ProductRow {
    ProductRow {
      id: 1,
      category_id: 1,
      name: name.to_string(),
      description: description.to_string(),
      price,
      photo: None,
      is_active: true,
    }
  }

  #[test]
  fn card_shows_price_and_description() {
    let text = product_card_text(&product("Роза", 19990, "Красная роза"));
    assert!(text.contains("199.90 ₽"));
    assert!(text.contains("Красная роза"));
  }

  #[test]
  fn empty_catalog_gets_an_explicit_message() {
    assert_eq!(category_list_text(None, true), "🛍 Каталог пока пуст.");
    assert!(category_list_text(None, false).contains("Выберите категорию"));
    assert!(category_list_text(Some("Букеты > Розы"), true).contains("нет подкатегорий"));
  }

  #[test]
  fn card_omits_empty_description() {
    let text = product_card_text(&product("Роза", 19990, ""));
    assert!(!text.ends_with('\n'));
    assert_eq!(text.matches("\n\n").count(), 1);
  }
}
