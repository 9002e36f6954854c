use anyhow::Context;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::types::MessageId;
use tracing::info;
use tracing::instrument;

use crate::bot::HandlerResult;
use crate::bot::handlers::BotDialogue;
use crate::bot::handlers::CallbackReply;
use crate::bot::handlers::SharedContext;
use crate::bot::handlers::ensure_user_record;
use crate::bot::handlers::safe_edit_text;
use crate::bot::keyboards;
use crate::bot::state::ConversationState;
use crate::util::clamp_page;
use crate::util::total_pages;

#[instrument(skip(bot, ctx, msg))]
pub(super) async fn handle_faq_command(bot: Bot, ctx: SharedContext, msg: Message) -> HandlerResult {
  let user = msg.from.as_ref().context("message missing sender")?;
  ensure_user_record(&ctx, user).await?;

  let (text, keyboard) = faq_page_view(&ctx, 1).await?;
  bot.send_message(msg.chat.id, text).reply_markup(keyboard).await?;
  Ok(())
}

async fn faq_page_view(ctx: &SharedContext, page: u64) -> anyhow::Result<(String, teloxide::types::InlineKeyboardMarkup)> {
  let per_page = ctx.pages().faq;
  let (mut items, total) = ctx.db().faq_page(page, per_page).await?;
  let pages = total_pages(total, per_page);
  let page = clamp_page(page, pages);
  if items.is_empty() && total > 0 {
    (items, _) = ctx.db().faq_page(page, per_page).await?;
  }

  let text = if items.is_empty() {
    "❓ Вопросов пока нет. Напишите нам свой!".to_string()
  } else {
    "❓ Частые вопросы:".to_string()
  };
  Ok((text, keyboards::faq_list_keyboard(&items, page, pages)))
}

pub(super) async fn show_faq_page(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  page: u64,
) -> HandlerResult {
  let (text, keyboard) = faq_page_view(ctx, page).await?;
  safe_edit_text(bot, chat, message_id, &text, keyboard).await
}

pub(super) async fn show_faq_item(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  item_id: i64,
  page: u64,
) -> anyhow::Result<CallbackReply> {
  let Some(item) = ctx.db().get_faq_item(item_id).await? else {
    return Ok(CallbackReply::toast("Этот вопрос больше не доступен."));
  };
  let text = format!("❓ {}\n\n{}", item.question, item.answer);
  safe_edit_text(bot, chat, message_id, &text, keyboards::faq_item_keyboard(page)).await?;
  Ok(CallbackReply::none())
}

pub(super) async fn ask_question(bot: &Bot, dialogue: &BotDialogue, chat: ChatId) -> anyhow::Result<CallbackReply> {
  dialogue.update(ConversationState::AwaitingFaqQuery { page: 1 }).await?;
  bot
    .send_message(chat, "🔍 Напишите ваш вопрос одним сообщением:")
    .await?;
  Ok(CallbackReply::none())
}

/// The typed question first runs against the FAQ; with no matches it goes
/// to the support chat.
#[instrument(skip(bot, ctx, dialogue, msg))]
pub(super) async fn handle_query_message(
  bot: Bot,
  ctx: SharedContext,
  dialogue: BotDialogue,
  msg: Message,
) -> HandlerResult {
  let chat = msg.chat.id;
  let Some(query) = msg.text().map(str::trim).filter(|text| !text.is_empty()) else {
    bot.send_message(chat, "Напишите вопрос текстом, пожалуйста.").await?;
    return Ok(());
  };
  dialogue.reset().await?;

  let per_page = ctx.pages().faq;
  let (items, total) = ctx.db().search_faq(query, 1, per_page).await?;
  if !items.is_empty() {
    let pages = total_pages(total, per_page);
    bot
      .send_message(chat, format!("🔍 Нашлось по запросу «{query}»:"))
      .reply_markup(keyboards::faq_search_keyboard(&items, query, 1, pages))
      .await?;
    return Ok(());
  }

  match ctx.support_chat_id() {
    Some(support_chat) => {
      let user = msg.from.as_ref();
      let from = user
        .map(|user| {
          let username = user.username.as_deref().unwrap_or("-");
          format!("{} (@{username}, id {})", user.first_name, user.id.0)
        })
        .unwrap_or_else(|| "неизвестный пользователь".to_string());
      bot
        .send_message(ChatId(support_chat), format!("❓ Вопрос от {from}:\n\n{query}"))
        .await?;
      info!(chat_id = %chat, "forwarded question to support chat");
      bot
        .send_message(chat, "Мы передали ваш вопрос оператору и скоро ответим.")
        .reply_markup(keyboards::faq_item_keyboard(1))
        .await?;
    },
    None => {
      bot
        .send_message(chat, "По вашему запросу ничего не нашлось.")
        .reply_markup(keyboards::faq_item_keyboard(1))
        .await?;
    },
  }
  Ok(())
}

pub(super) async fn show_search_page(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  query: &str,
  page: u64,
) -> HandlerResult {
  let per_page = ctx.pages().faq;
  let (mut items, total) = ctx.db().search_faq(query, page, per_page).await?;
  let pages = total_pages(total, per_page);
  let page = clamp_page(page, pages);
  if items.is_empty() && total > 0 {
    (items, _) = ctx.db().search_faq(query, page, per_page).await?;
  }

  let text = if items.is_empty() {
    format!("🔍 По запросу «{query}» ничего не нашлось.")
  } else {
    format!("🔍 Нашлось по запросу «{query}»:")
  };
  safe_edit_text(bot, chat, message_id, &text, keyboards::faq_search_keyboard(&items, query, page, pages)).await
}
