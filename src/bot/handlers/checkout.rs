//! Checkout conversation: address, phone, optional wishes and delivery
//! time, then a confirmation screen with an edit loop. Going back never
//! loses what was already entered.

use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::types::MessageId;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::bot::HandlerResult;
use crate::bot::callback::CheckoutField;
use crate::bot::handlers::BotDialogue;
use crate::bot::handlers::CallbackReply;
use crate::bot::handlers::SharedContext;
use crate::bot::handlers::delete_quietly;
use crate::bot::keyboards;
use crate::bot::state::CheckoutDraft;
use crate::bot::state::CheckoutStage;
use crate::models::CartLine;
use crate::models::cart_totals;
use crate::util::format_kopecks;
use crate::util::is_valid_phone;

pub(super) async fn start(
  bot: &Bot,
  ctx: &SharedContext,
  dialogue: &BotDialogue,
  chat: ChatId,
  user_id: i64,
) -> anyhow::Result<CallbackReply> {
  let lines = ctx.db().cart_lines(user_id).await?;
  if lines.is_empty() {
    return Ok(CallbackReply::toast("Корзина пуста."));
  }

  let mut draft = CheckoutDraft::new();
  send_stage_prompt(bot, ctx, dialogue, chat, user_id, &mut draft).await?;
  Ok(CallbackReply::none())
}

/// One text message answers the current prompt.
#[instrument(skip(bot, ctx, dialogue, draft, msg))]
pub(super) async fn handle_message(
  bot: Bot,
  ctx: SharedContext,
  dialogue: BotDialogue,
  draft: CheckoutDraft,
  msg: Message,
) -> HandlerResult {
  let mut draft = draft;
  let chat = msg.chat.id;
  let user_id = msg.from.as_ref().map(|user| user.id.0 as i64).unwrap_or(chat.0);

  let Some(text) = msg.text().map(str::trim).filter(|text| !text.is_empty()) else {
    bot.send_message(chat, "Отправьте ответ текстом, пожалуйста.").await?;
    return Ok(());
  };

  let accepted = match draft.stage {
    CheckoutStage::Address => {
      draft.address = Some(text.to_string());
      true
    },
    CheckoutStage::Phone => {
      if is_valid_phone(text) {
        draft.phone = Some(text.to_string());
        true
      } else {
        bot
          .send_message(chat, "Неверный формат номера. Пример: +79991234567")
          .await?;
        false
      }
    },
    CheckoutStage::Wishes => {
      draft.wishes = Some(text.to_string());
      true
    },
    CheckoutStage::DeliveryTime => {
      draft.delivery_time = Some(text.to_string());
      true
    },
    CheckoutStage::Confirmation | CheckoutStage::EditChoice => {
      bot
        .send_message(chat, "Воспользуйтесь кнопками под сообщением выше.")
        .await?;
      false
    },
  };
  if !accepted {
    return Ok(());
  }

  if let Some(prompt_id) = draft.prompt_message_id.take() {
    delete_quietly(&bot, chat, MessageId(prompt_id)).await;
  }

  draft.advance_after_answer();
  send_stage_prompt(&bot, &ctx, &dialogue, chat, user_id, &mut draft).await
}

pub(super) async fn go_back(
  bot: &Bot,
  ctx: &SharedContext,
  dialogue: &BotDialogue,
  chat: ChatId,
  user_id: i64,
) -> anyhow::Result<CallbackReply> {
  let Some(mut draft) = current_draft(dialogue).await? else {
    return Ok(stale_checkout());
  };

  // Backing out of an edited prompt returns to the confirmation screen,
  // not to the preceding prompt of the linear flow.
  if draft.editing {
    draft.editing = false;
    draft.stage = CheckoutStage::Confirmation;
    send_stage_prompt(bot, ctx, dialogue, chat, user_id, &mut draft).await?;
    return Ok(CallbackReply::none());
  }

  match draft.previous_stage() {
    Some(stage) => {
      draft.stage = stage;
      send_stage_prompt(bot, ctx, dialogue, chat, user_id, &mut draft).await?;
    },
    None => {
      // Back from the very first prompt returns to the cart.
      dialogue.reset().await?;
      send_cart_message(bot, ctx, chat, user_id).await?;
    },
  }
  Ok(CallbackReply::none())
}

pub(super) async fn skip_prompt(
  bot: &Bot,
  ctx: &SharedContext,
  dialogue: &BotDialogue,
  chat: ChatId,
  user_id: i64,
) -> anyhow::Result<CallbackReply> {
  let Some(mut draft) = current_draft(dialogue).await? else {
    return Ok(stale_checkout());
  };

  match draft.stage {
    CheckoutStage::Wishes => draft.wishes = Some(String::new()),
    CheckoutStage::DeliveryTime => draft.delivery_time = Some(String::new()),
    _ => return Ok(CallbackReply::toast("Этот шаг нельзя пропустить.")),
  }

  draft.advance_after_answer();
  send_stage_prompt(bot, ctx, dialogue, chat, user_id, &mut draft).await?;
  Ok(CallbackReply::none())
}

pub(super) async fn show_edit_choice(
  bot: &Bot,
  ctx: &SharedContext,
  dialogue: &BotDialogue,
  chat: ChatId,
  user_id: i64,
) -> anyhow::Result<CallbackReply> {
  let Some(mut draft) = current_draft(dialogue).await? else {
    return Ok(stale_checkout());
  };
  draft.stage = CheckoutStage::EditChoice;
  send_stage_prompt(bot, ctx, dialogue, chat, user_id, &mut draft).await?;
  Ok(CallbackReply::none())
}

pub(super) async fn edit_field(
  bot: &Bot,
  ctx: &SharedContext,
  dialogue: &BotDialogue,
  chat: ChatId,
  user_id: i64,
  field: CheckoutField,
) -> anyhow::Result<CallbackReply> {
  let Some(mut draft) = current_draft(dialogue).await? else {
    return Ok(stale_checkout());
  };
  draft.begin_edit(field);
  send_stage_prompt(bot, ctx, dialogue, chat, user_id, &mut draft).await?;
  Ok(CallbackReply::none())
}

pub(super) async fn back_to_confirmation(
  bot: &Bot,
  ctx: &SharedContext,
  dialogue: &BotDialogue,
  chat: ChatId,
  user_id: i64,
) -> anyhow::Result<CallbackReply> {
  let Some(mut draft) = current_draft(dialogue).await? else {
    return Ok(stale_checkout());
  };
  draft.editing = false;
  draft.stage = CheckoutStage::Confirmation;
  send_stage_prompt(bot, ctx, dialogue, chat, user_id, &mut draft).await?;
  Ok(CallbackReply::none())
}

/// Places the order and, when the payment gateway is configured, sends a
/// payment link right away.
#[instrument(skip(bot, ctx, dialogue))]
pub(super) async fn confirm(
  bot: &Bot,
  ctx: &SharedContext,
  dialogue: &BotDialogue,
  chat: ChatId,
  user_id: i64,
) -> anyhow::Result<CallbackReply> {
  let Some(draft) = current_draft(dialogue).await? else {
    return Ok(stale_checkout());
  };
  let (Some(address), Some(phone)) = (draft.address.as_deref(), draft.phone.as_deref()) else {
    return Ok(CallbackReply::toast("Анкета заполнена не полностью."));
  };

  let wishes = draft.wishes.as_deref().filter(|text| !text.is_empty());
  let delivery_time = draft.delivery_time.as_deref().filter(|text| !text.is_empty());
  let order = match ctx
    .db()
    .create_order_from_cart(user_id, address, phone, wishes, delivery_time)
    .await
  {
    Ok(order) => order,
    Err(err) => {
      warn!(user_id, error = %err, "order creation failed");
      dialogue.reset().await?;
      bot
        .send_message(chat, "Не удалось оформить заказ. Попробуйте ещё раз.")
        .reply_markup(keyboards::profile_keyboard())
        .await?;
      return Ok(CallbackReply::none());
    },
  };
  dialogue.reset().await?;
  info!(user_id, order_id = order.id, total = order.total, "order placed");

  if let Some(support_chat) = ctx.support_chat_id() {
    let notice = format!(
      "🆕 Заказ №{} от пользователя {user_id} на {}.\n📍 {address}\n📞 {phone}",
      order.id,
      format_kopecks(order.total)
    );
    if let Err(err) = bot.send_message(ChatId(support_chat), notice).await {
      warn!(order_id = order.id, error = %err, "could not notify support chat");
    }
  }

  let summary = format!(
    "✅ Заказ №{} оформлен на сумму {}.",
    order.id,
    format_kopecks(order.total)
  );

  let Some(payments) = ctx.payments() else {
    bot
      .send_message(chat, format!("{summary}\nМы свяжемся с вами для подтверждения."))
      .reply_markup(keyboards::profile_keyboard())
      .await?;
    return Ok(CallbackReply::none());
  };

  match payments
    .create_payment(order.total, format!("Заказ №{}", order.id), order.id, user_id)
    .await
  {
    Ok(payment) => {
      ctx.db().set_order_payment_id(order.id, Some(&payment.id)).await?;
      match payment.confirmation_url() {
        Some(url) => {
          bot
            .send_message(chat, format!("{summary}\nОплатите заказ по кнопке ниже."))
            .reply_markup(keyboards::payment_keyboard(url, order.id))
            .await?;
        },
        None => {
          bot
            .send_message(chat, summary)
            .reply_markup(keyboards::check_payment_keyboard(order.id))
            .await?;
        },
      }
    },
    Err(err) => {
      warn!(order_id = order.id, error = %err, "payment creation failed");
      bot
        .send_message(
          chat,
          format!("{summary}\nНе удалось создать платёж, попробуйте позже в профиле."),
        )
        .reply_markup(keyboards::profile_keyboard())
        .await?;
    },
  }
  Ok(CallbackReply::none())
}

async fn current_draft(dialogue: &BotDialogue) -> anyhow::Result<Option<CheckoutDraft>> {
  use crate::bot::state::ConversationState;
  match dialogue.get().await? {
    Some(ConversationState::Checkout(draft)) => Ok(Some(draft)),
    _ => Ok(None),
  }
}

fn stale_checkout() -> CallbackReply {
  CallbackReply::toast("Оформление уже завершено. Откройте корзину заново.")
}

/// Sends the prompt for the draft's current stage, remembers its message
/// id and saves the draft.
async fn send_stage_prompt(
  bot: &Bot,
  ctx: &SharedContext,
  dialogue: &BotDialogue,
  chat: ChatId,
  user_id: i64,
  draft: &mut CheckoutDraft,
) -> HandlerResult {
  use crate::bot::state::ConversationState;

  let sent = match draft.stage {
    CheckoutStage::Address => {
      bot
        .send_message(chat, "📍 Введите адрес доставки:")
        .reply_markup(keyboards::back_keyboard())
        .await?
    },
    CheckoutStage::Phone => {
      bot
        .send_message(chat, "📞 Введите номер телефона (например, +79991234567):")
        .reply_markup(keyboards::back_keyboard())
        .await?
    },
    CheckoutStage::Wishes => {
      bot
        .send_message(chat, "💬 Пожелания к заказу:")
        .reply_markup(keyboards::back_or_skip_keyboard())
        .await?
    },
    CheckoutStage::DeliveryTime => {
      bot
        .send_message(chat, "🕐 Желаемое время доставки:")
        .reply_markup(keyboards::back_or_skip_keyboard())
        .await?
    },
    CheckoutStage::Confirmation => {
      let lines = ctx.db().cart_lines(user_id).await?;
      bot
        .send_message(chat, confirmation_text(draft, &lines))
        .reply_markup(keyboards::confirmation_keyboard())
        .await?
    },
    CheckoutStage::EditChoice => {
      bot
        .send_message(chat, "✏️ Что изменить?")
        .reply_markup(keyboards::edit_choice_keyboard())
        .await?
    },
  };

  draft.prompt_message_id = Some(sent.id.0);
  dialogue.update(ConversationState::Checkout(draft.clone())).await?;
  Ok(())
}

async fn send_cart_message(bot: &Bot, ctx: &SharedContext, chat: ChatId, user_id: i64) -> HandlerResult {
  let lines = ctx.db().cart_lines(user_id).await?;
  let (quantity, total) = cart_totals(&lines);
  let text = if lines.is_empty() {
    "🛒 Корзина пуста.".to_string()
  } else {
    format!("🛒 В корзине {quantity} шт на {}", format_kopecks(total))
  };
  bot
    .send_message(chat, text)
    .reply_markup(keyboards::cart_keyboard(&lines, 1, 1))
    .await?;
  Ok(())
}

fn confirmation_text(draft: &CheckoutDraft, lines: &[CartLine]) -> String {
  let (_, total) = cart_totals(lines);
  fn optional(value: Option<&str>) -> &str {
    match value.filter(|text| !text.is_empty()) {
      Some(text) => text,
      None => "—",
    }
  }

  let mut text = String::from("📦 Проверьте заказ:\n");
  for line in lines {
    text.push_str(&format!("\n• {} × {}", line.name, line.quantity));
  }
  text.push_str(&format!(
    "\n\n📍 Адрес: {}\n📞 Телефон: {}\n💬 Пожелания: {}\n🕐 Время доставки: {}\n\n💰 Итого: {}",
    optional(draft.address.as_deref()),
    optional(draft.phone.as_deref()),
    optional(draft.wishes.as_deref()),
    optional(draft.delivery_time.as_deref()),
    format_kopecks(total)
  ));
  text
}

#[cfg(test)]
mod tests {
  use super::confirmation_text;
  use crate::bot::state::CheckoutDraft;
  use crate::models::CartLine;

  #[test]
  fn confirmation_shows_dashes_for_skipped_fields() {
    let mut draft = CheckoutDraft::new();
    draft.address = Some("Невский 1".to_string());
    draft.phone = Some("+79991234567".to_string());
    draft.wishes = Some(String::new());

    let lines = vec![CartLine {
      product_id: 1,
      name: "Роза".to_string(),
      price: 10000,
      quantity: 2,
    }];
    let text = confirmation_text(&draft, &lines);
    assert!(text.contains("Адрес: Невский 1"));
    assert!(text.contains("Пожелания: —"));
    assert!(text.contains("Итого: 200.00 ₽"));
  }
}
