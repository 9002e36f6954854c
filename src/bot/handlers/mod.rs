use std::sync::Arc;

use teloxide::ApiError;
use teloxide::RequestError;
use teloxide::dispatching::UpdateHandler;
use teloxide::dispatching::dialogue::Dialogue;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::types::ChatId;
use teloxide::types::InlineKeyboardMarkup;
use teloxide::types::Message;
use teloxide::types::MessageId;
use teloxide::types::User;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::bot::Command;
use crate::bot::DialogueStorage;
use crate::bot::HandlerResult;
use crate::bot::callback::CallbackAction;
use crate::bot::context::AppContext;
use crate::bot::state::ConversationState;

mod admin;
mod cart;
mod catalog;
mod checkout;
mod faq;
mod payments;
mod profile;
mod start;

pub(crate) type SharedContext = Arc<AppContext>;
pub(crate) type BotDialogue = Dialogue<ConversationState, DialogueStorage>;

/// What to say in the callback-query answer popup.
pub(crate) struct CallbackReply {
  text: Option<String>,
  show_alert: bool,
}

impl CallbackReply {
  pub(crate) fn none() -> Self {
    Self {
      text: None,
      show_alert: false,
    }
  }

  pub(crate) fn toast(text: impl Into<String>) -> Self {
    Self {
      text: Some(text.into()),
      show_alert: false,
    }
  }

  pub(crate) fn alert(text: impl Into<String>) -> Self {
    Self {
      text: Some(text.into()),
      show_alert: true,
    }
  }
}

pub fn build_schema() -> UpdateHandler<anyhow::Error> {
  let message_handler = Update::filter_message()
    .enter_dialogue::<Message, DialogueStorage, ConversationState>()
    .branch(command_branch())
    .branch(dptree::case![ConversationState::Checkout(draft)].endpoint(checkout::handle_message))
    .branch(dptree::case![ConversationState::AwaitingFaqQuery { page }].endpoint(faq::handle_query_message))
    .branch(dptree::case![ConversationState::AwaitingImport { admin_tg_id }].endpoint(admin::handle_import_message))
    .branch(dptree::case![ConversationState::TogglingProduct { admin_tg_id }].endpoint(admin::handle_toggle_product_message))
    .branch(dptree::case![ConversationState::TogglingFaq { admin_tg_id }].endpoint(admin::handle_toggle_faq_message))
    .branch(dptree::endpoint(handle_idle_message));

  let callback_handler = Update::filter_callback_query()
    .enter_dialogue::<CallbackQuery, DialogueStorage, ConversationState>()
    .endpoint(handle_callback_query);

  dptree::entry().branch(message_handler).branch(callback_handler)
}

fn command_branch() -> UpdateHandler<anyhow::Error> {
  dptree::entry()
    .filter_command::<Command>()
    .branch(dptree::case![Command::Start].endpoint(start::handle_start))
    .branch(dptree::case![Command::Catalog].endpoint(catalog::handle_catalog_command))
    .branch(dptree::case![Command::Cart].endpoint(cart::handle_cart_command))
    .branch(dptree::case![Command::Faq].endpoint(faq::handle_faq_command))
    .branch(dptree::case![Command::Profile].endpoint(profile::handle_profile_command))
    .branch(dptree::case![Command::Help].endpoint(start::handle_help))
}

#[instrument(skip(bot, msg))]
async fn handle_idle_message(bot: Bot, msg: Message) -> HandlerResult {
  if msg.text().is_none() {
    return Ok(());
  }
  bot
    .send_message(msg.chat.id, "Воспользуйтесь кнопками меню или командой /start.")
    .await?;
  Ok(())
}

#[instrument(skip(bot, ctx, query, dialogue))]
async fn handle_callback_query(
  bot: Bot,
  ctx: SharedContext,
  query: CallbackQuery,
  dialogue: BotDialogue,
) -> HandlerResult {
  ensure_user_record(&ctx, &query.from).await?;
  let user_id = query.from.id.0 as i64;
  let message_ctx = query.message.as_ref().map(|message| (message.chat().id, message.id()));
  let callback_data = query.data.as_deref().unwrap_or("<empty>");
  info!(user_id, callback = callback_data, "handling callback query");

  let reply = match query.data.as_deref().and_then(CallbackAction::parse) {
    Some(action) => dispatch_action(&bot, &ctx, &dialogue, user_id, message_ctx, action).await?,
    None => {
      warn!(user_id, callback = callback_data, "unrecognized callback data");
      CallbackReply::toast("Кнопка устарела. Откройте меню заново: /start")
    },
  };

  let mut answer = bot.answer_callback_query(query.id);
  if let Some(text) = reply.text {
    answer = answer.text(text);
  }
  if reply.show_alert {
    answer = answer.show_alert(true);
  }
  answer.await?;
  Ok(())
}

async fn dispatch_action(
  bot: &Bot,
  ctx: &SharedContext,
  dialogue: &BotDialogue,
  user_id: i64,
  message_ctx: Option<(ChatId, MessageId)>,
  action: CallbackAction,
) -> anyhow::Result<CallbackReply> {
  let Some((chat_id, message_id)) = message_ctx else {
    // Inaccessible message: the button outlived its chat history.
    return Ok(CallbackReply::toast("Сообщение недоступно. Откройте меню заново: /start"));
  };

  match action {
    CallbackAction::MainMenu => {
      dialogue.reset().await?;
      start::show_main_menu(bot, ctx, chat_id, message_id, user_id).await?;
      Ok(CallbackReply::none())
    },
    CallbackAction::CategoryList { parent, page } => {
      catalog::show_category_list(bot, ctx, chat_id, message_id, parent, page).await?;
      Ok(CallbackReply::none())
    },
    CallbackAction::OpenCategory { category_id, page } => catalog::open_category(bot, ctx, chat_id, message_id, category_id, page).await,
    CallbackAction::ProductList { category_id, page } => catalog::show_product_list(bot, ctx, chat_id, message_id, category_id, page).await,
    CallbackAction::ShowProduct { product_id } => catalog::show_product(bot, ctx, chat_id, message_id, product_id).await,
    CallbackAction::AddToCart { product_id } => cart::add_to_cart(ctx, user_id, product_id).await,
    CallbackAction::ShowCart { page } => {
      cart::show_cart(bot, ctx, chat_id, message_id, user_id, page).await?;
      Ok(CallbackReply::none())
    },
    CallbackAction::IncreaseItem { product_id } => cart::change_quantity(bot, ctx, chat_id, message_id, user_id, product_id, 1).await,
    CallbackAction::DecreaseItem { product_id } => cart::change_quantity(bot, ctx, chat_id, message_id, user_id, product_id, -1).await,
    CallbackAction::RemoveItem { product_id } => cart::remove_item(bot, ctx, chat_id, message_id, user_id, product_id).await,
    CallbackAction::ClearCart => cart::clear_cart(bot, ctx, chat_id, message_id, user_id).await,
    CallbackAction::StartCheckout => checkout::start(bot, ctx, dialogue, chat_id, user_id).await,
    CallbackAction::CheckoutBack => checkout::go_back(bot, ctx, dialogue, chat_id, user_id).await,
    CallbackAction::CheckoutSkip => checkout::skip_prompt(bot, ctx, dialogue, chat_id, user_id).await,
    CallbackAction::ConfirmOrder => checkout::confirm(bot, ctx, dialogue, chat_id, user_id).await,
    CallbackAction::EditOrder => checkout::show_edit_choice(bot, ctx, dialogue, chat_id, user_id).await,
    CallbackAction::EditField(field) => checkout::edit_field(bot, ctx, dialogue, chat_id, user_id, field).await,
    CallbackAction::BackToConfirmation => checkout::back_to_confirmation(bot, ctx, dialogue, chat_id, user_id).await,
    CallbackAction::FaqList | CallbackAction::FaqPage { page: 1 } => {
      dialogue.reset().await?;
      faq::show_faq_page(bot, ctx, chat_id, message_id, 1).await?;
      Ok(CallbackReply::none())
    },
    CallbackAction::FaqPage { page } => {
      faq::show_faq_page(bot, ctx, chat_id, message_id, page).await?;
      Ok(CallbackReply::none())
    },
    CallbackAction::FaqItem { item_id, page } => faq::show_faq_item(bot, ctx, chat_id, message_id, item_id, page).await,
    CallbackAction::AskQuestion => faq::ask_question(bot, dialogue, chat_id).await,
    CallbackAction::SearchPage { page, query } => {
      faq::show_search_page(bot, ctx, chat_id, message_id, &query, page).await?;
      Ok(CallbackReply::none())
    },
    CallbackAction::CheckPayment { order_id } => payments::check_payment(bot, ctx, chat_id, message_id, user_id, order_id).await,
    CallbackAction::Profile => {
      profile::show_profile(bot, ctx, chat_id, message_id, user_id).await?;
      Ok(CallbackReply::none())
    },
    CallbackAction::AdminMenu => admin::show_menu(bot, ctx, chat_id, message_id, user_id).await,
    CallbackAction::AdminOrders => admin::show_orders(bot, ctx, chat_id, message_id, user_id).await,
    CallbackAction::AdminOrder { order_id } => admin::show_order(bot, ctx, chat_id, message_id, user_id, order_id).await,
    CallbackAction::AdminSetStatus { order_id, status } => {
      admin::set_status(bot, ctx, chat_id, message_id, user_id, order_id, status).await
    },
    CallbackAction::AdminExportProducts { csv } => admin::export_products(bot, ctx, chat_id, user_id, csv).await,
    CallbackAction::AdminExportOrders => admin::export_orders(bot, ctx, chat_id, user_id).await,
    CallbackAction::AdminImportProducts => admin::request_import(bot, ctx, dialogue, chat_id, user_id).await,
    CallbackAction::AdminToggleProduct => {
      admin::request_toggle(bot, ctx, dialogue, chat_id, user_id, admin::ToggleTarget::Product).await
    },
    CallbackAction::AdminToggleFaq => {
      admin::request_toggle(bot, ctx, dialogue, chat_id, user_id, admin::ToggleTarget::Faq).await
    },
    CallbackAction::Noop => Ok(CallbackReply::none()),
  }
}

/// "Message is not modified" is the one edit rejection that needs no
/// reaction at all.
pub(crate) fn benign_edit_error(err: &RequestError) -> bool {
  matches!(err, RequestError::Api(ApiError::MessageNotModified))
}

/// Edits the message in place. "Not modified" is fine; any other API
/// rejection (a photo message, a deleted message) falls back to sending a
/// fresh one.
pub(crate) async fn safe_edit_text(
  bot: &Bot,
  chat: ChatId,
  message_id: MessageId,
  text: &str,
  keyboard: InlineKeyboardMarkup,
) -> HandlerResult {
  let request = bot
    .edit_message_text(chat, message_id, text)
    .reply_markup(keyboard.clone());
  match request.await {
    Ok(_) => Ok(()),
    Err(ref err) if benign_edit_error(err) => Ok(()),
    Err(RequestError::Api(err)) => {
      warn!(chat_id = %chat, message_id = %message_id, error = %err, "edit failed, sending a new message");
      bot.send_message(chat, text).reply_markup(keyboard).await?;
      Ok(())
    },
    Err(err) => Err(err.into()),
  }
}

pub(crate) async fn delete_quietly(bot: &Bot, chat: ChatId, message_id: MessageId) {
  if let Err(err) = bot.delete_message(chat, message_id).await {
    debug!(chat_id = %chat, message_id = %message_id, error = %err, "could not delete message");
  }
}

pub(crate) async fn ensure_user_record(ctx: &SharedContext, user: &User) -> HandlerResult {
  ctx
    .db()
    .upsert_user(
      user.id.0 as i64,
      user.username.clone(),
      Some(user.first_name.clone()),
      user.last_name.clone(),
      user.language_code.clone(),
    )
    .await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use teloxide::ApiError;
  use teloxide::RequestError;

  use super::benign_edit_error;

  #[test]
  fn only_not_modified_is_benign() {
    assert!(benign_edit_error(&RequestError::Api(ApiError::MessageNotModified)));
    assert!(!benign_edit_error(&RequestError::Api(ApiError::Unknown(
      "Bad Request: message can't be edited".to_string()
    ))));
  }
}
