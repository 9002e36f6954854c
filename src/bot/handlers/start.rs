use anyhow::Context;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::types::MessageId;
use teloxide::types::UserId;
use teloxide::utils::command::BotCommands;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::bot::Command;
use crate::bot::HandlerResult;
use crate::bot::handlers::BotDialogue;
use crate::bot::handlers::SharedContext;
use crate::bot::handlers::ensure_user_record;
use crate::bot::handlers::safe_edit_text;
use crate::bot::keyboards;
use crate::models::cart_totals;

const MAIN_MENU_TEXT: &str = "🛍 Главное меню\nВыберите раздел:";

#[instrument(skip(bot, ctx, dialogue, msg))]
pub(super) async fn handle_start(bot: Bot, dialogue: BotDialogue, ctx: SharedContext, msg: Message) -> HandlerResult {
  dialogue.reset().await?;
  let user = msg.from.as_ref().context("message missing sender")?;
  ensure_user_record(&ctx, user).await?;
  let user_id = user.id.0 as i64;
  info!(user_id, chat_id = %msg.chat.id, "received /start command");

  if !is_subscribed(&bot, &ctx, user.id).await? {
    bot
      .send_message(
        msg.chat.id,
        "Чтобы пользоваться магазином, подпишитесь на наш канал и группу, затем снова отправьте /start.",
      )
      .await?;
    return Ok(());
  }

  let (text, keyboard) = main_menu_view(&ctx, user_id).await?;
  bot
    .send_message(msg.chat.id, format!("👋 Добро пожаловать в наш магазин!\n\n{text}"))
    .reply_markup(keyboard)
    .await?;
  Ok(())
}

#[instrument(skip(bot, msg))]
pub(super) async fn handle_help(bot: Bot, msg: Message) -> HandlerResult {
  let mut text = Command::descriptions().to_string();
  text.push_str("\n\nВсе разделы магазина доступны из меню. Отправьте /start, чтобы открыть его заново.");
  bot.send_message(msg.chat.id, text).await?;
  Ok(())
}

/// Both gates must pass; an unconfigured gate passes by itself. A gateway
/// error fails open so a misconfigured channel id does not lock the shop.
async fn is_subscribed(bot: &Bot, ctx: &SharedContext, user: UserId) -> anyhow::Result<bool> {
  for chat_id in [ctx.subscription_channel_id(), ctx.subscription_group_id()].into_iter().flatten() {
    match bot.get_chat_member(ChatId(chat_id), user).await {
      Ok(member) => {
        if !member.is_present() {
          return Ok(false);
        }
      },
      Err(err) => {
        warn!(chat_id, error = %err, "subscription check failed, letting the user through");
      },
    }
  }
  Ok(true)
}

pub(super) async fn show_main_menu(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  user_id: i64,
) -> HandlerResult {
  let (text, keyboard) = main_menu_view(ctx, user_id).await?;
  safe_edit_text(bot, chat, message_id, &text, keyboard).await
}

async fn main_menu_view(
  ctx: &SharedContext,
  user_id: i64,
) -> anyhow::Result<(String, teloxide::types::InlineKeyboardMarkup)> {
  let lines = ctx.db().cart_lines(user_id).await?;
  let (quantity, total) = cart_totals(&lines);
  let keyboard = keyboards::main_menu_keyboard(quantity, total, ctx.is_admin(user_id));
  Ok((MAIN_MENU_TEXT.to_string(), keyboard))
}
