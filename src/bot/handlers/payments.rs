use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::types::MessageId;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::bot::handlers::CallbackReply;
use crate::bot::handlers::SharedContext;
use crate::bot::keyboards;
use crate::payments::PaymentStatus;
use crate::util::format_kopecks;

/// "Check payment" button. Success rewrites the message; anything else
/// leaves the text alone, refreshes the keyboard and pops an alert.
#[instrument(skip(bot, ctx))]
pub(super) async fn check_payment(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  user_id: i64,
  order_id: i64,
) -> anyhow::Result<CallbackReply> {
  let Some(payments) = ctx.payments() else {
    return Ok(CallbackReply::alert("Оплата временно недоступна."));
  };
  let Some(order) = ctx.db().get_user_order(order_id, user_id).await? else {
    return Ok(CallbackReply::toast("Заказ не найден."));
  };

  if order.is_paid {
    return Ok(CallbackReply::toast("Заказ уже оплачен."));
  }
  let Some(payment_id) = order.payment_id.as_deref() else {
    return Ok(CallbackReply::alert("Платёж по заказу не создавался."));
  };

  let payment = match payments.find_payment(payment_id).await {
    Ok(payment) => payment,
    Err(err) => {
      warn!(order_id, error = %err, "payment lookup failed");
      return Ok(CallbackReply::alert("Не удалось проверить оплату, попробуйте позже."));
    },
  };

  if payment.status == PaymentStatus::Succeeded {
    ctx.db().mark_order_paid(order.id).await?;
    info!(order_id, user_id, "order paid");
    let text = format!(
      "✅ Заказ №{} оплачен ({}). Спасибо за покупку!",
      order.id,
      format_kopecks(order.total)
    );
    crate::bot::handlers::safe_edit_text(bot, chat, message_id, &text, keyboards::after_payment_keyboard()).await?;
    return Ok(CallbackReply::toast("Оплата получена."));
  }

  // Not paid: issue a fresh payment and swap only the keyboard, keeping
  // the message text (and any card details in it) intact.
  let keyboard = match payments
    .create_payment(order.total, format!("Заказ №{}", order.id), order.id, user_id)
    .await
  {
    Ok(fresh) => {
      ctx.db().set_order_payment_id(order.id, Some(&fresh.id)).await?;
      match fresh.confirmation_url() {
        Some(url) => keyboards::payment_keyboard(url, order.id),
        None => keyboards::check_payment_keyboard(order.id),
      }
    },
    Err(err) => {
      warn!(order_id, error = %err, "could not create replacement payment");
      keyboards::check_payment_keyboard(order.id)
    },
  };
  if let Err(err) = bot.edit_message_reply_markup(chat, message_id).reply_markup(keyboard).await
    && !crate::bot::handlers::benign_edit_error(&err)
  {
    warn!(order_id, error = %err, "could not refresh payment keyboard");
  }
  Ok(CallbackReply::alert("Платёж ещё не прошёл. Попробуйте чуть позже."))
}
