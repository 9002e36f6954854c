//! Inline keyboard builders. All callback data goes through
//! [`CallbackAction::encode`] so buttons and the dispatcher can never drift
//! apart.

use teloxide::types::InlineKeyboardButton;
use teloxide::types::InlineKeyboardMarkup;

use crate::bot::callback::CallbackAction;
use crate::bot::callback::CheckoutField;
use crate::models::CartLine;
use crate::models::CategoryRow;
use crate::models::FaqRow;
use crate::models::OrderStatus;
use crate::models::ProductRow;
use crate::util::format_kopecks;
use crate::util::truncate_button_text;

const BUTTON_TEXT_LIMIT: usize = 48;

fn button(label: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
  InlineKeyboardButton::callback(label.into(), action.encode())
}

/// "← | page/total | →" row; `None` when there is a single page.
fn nav_row(page: u64, total_pages: u64, prev: CallbackAction, next: CallbackAction) -> Option<Vec<InlineKeyboardButton>> {
  if total_pages <= 1 {
    return None;
  }
  let mut row = Vec::new();
  if page > 1 {
    row.push(button("⬅️", prev));
  }
  row.push(button(format!("{page}/{total_pages}"), CallbackAction::Noop));
  if page < total_pages {
    row.push(button("➡️", next));
  }
  Some(row)
}

pub fn main_menu_keyboard(cart_quantity: i64, cart_total: i64, is_admin: bool) -> InlineKeyboardMarkup {
  let cart_label = if cart_quantity > 0 {
    format!("🛒 Корзина ({cart_quantity} шт, {})", format_kopecks(cart_total))
  } else {
    "🛒 Корзина".to_string()
  };

  let mut rows = vec![
    vec![button("🛍 Каталог", CallbackAction::CategoryList { parent: None, page: 1 })],
    vec![button(cart_label, CallbackAction::ShowCart { page: 1 })],
    vec![
      button("❓ FAQ", CallbackAction::FaqList),
      button("👤 Профиль", CallbackAction::Profile),
    ],
  ];
  if is_admin {
    rows.push(vec![button("⚙️ Админ-панель", CallbackAction::AdminMenu)]);
  }
  InlineKeyboardMarkup::new(rows)
}

pub fn categories_keyboard(
  categories: &[CategoryRow],
  parent: Option<i64>,
  page: u64,
  total_pages: u64,
  back: CallbackAction,
) -> InlineKeyboardMarkup {
  let mut rows: Vec<Vec<InlineKeyboardButton>> = categories
    .iter()
    .map(|category| {
      vec![button(
        truncate_button_text(&category.name, BUTTON_TEXT_LIMIT),
        CallbackAction::OpenCategory {
          category_id: category.id,
          page: 1,
        },
      )]
    })
    .collect();

  if let Some(nav) = nav_row(
    page,
    total_pages,
    CallbackAction::CategoryList { parent, page: page - 1 },
    CallbackAction::CategoryList { parent, page: page + 1 },
  ) {
    rows.push(nav);
  }
  rows.push(vec![button("⬅️ Назад", back)]);
  InlineKeyboardMarkup::new(rows)
}

pub fn products_keyboard(
  products: &[ProductRow],
  category_id: i64,
  page: u64,
  total_pages: u64,
  back: CallbackAction,
) -> InlineKeyboardMarkup {
  let mut rows: Vec<Vec<InlineKeyboardButton>> = products
    .iter()
    .map(|product| {
      let label = format!("{} — {}", product.name, format_kopecks(product.price));
      vec![button(
        truncate_button_text(&label, BUTTON_TEXT_LIMIT),
        CallbackAction::ShowProduct { product_id: product.id },
      )]
    })
    .collect();

  if let Some(nav) = nav_row(
    page,
    total_pages,
    CallbackAction::ProductList {
      category_id,
      page: page - 1,
    },
    CallbackAction::ProductList {
      category_id,
      page: page + 1,
    },
  ) {
    rows.push(nav);
  }
  rows.push(vec![button("⬅️ Назад", back)]);
  InlineKeyboardMarkup::new(rows)
}

pub fn product_keyboard(product_id: i64, category_id: i64, page: u64) -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![
    vec![button("🛒 В корзину", CallbackAction::AddToCart { product_id })],
    vec![button("⬅️ Назад", CallbackAction::ProductList { category_id, page })],
  ])
}

pub fn cart_keyboard(lines: &[CartLine], page: u64, total_pages: u64) -> InlineKeyboardMarkup {
  let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();
  for line in lines {
    rows.push(vec![button(
      truncate_button_text(&format!("{} × {}", line.name, line.quantity), BUTTON_TEXT_LIMIT),
      CallbackAction::Noop,
    )]);
    rows.push(vec![
      button("➖", CallbackAction::DecreaseItem { product_id: line.product_id }),
      button("➕", CallbackAction::IncreaseItem { product_id: line.product_id }),
      button("✖️", CallbackAction::RemoveItem { product_id: line.product_id }),
    ]);
  }

  if let Some(nav) = nav_row(
    page,
    total_pages,
    CallbackAction::ShowCart { page: page - 1 },
    CallbackAction::ShowCart { page: page + 1 },
  ) {
    rows.push(nav);
  }
  if !lines.is_empty() {
    rows.push(vec![button("✅ Оформить заказ", CallbackAction::StartCheckout)]);
    rows.push(vec![button("🗑 Очистить корзину", CallbackAction::ClearCart)]);
  }
  rows.push(vec![button("⬅️ Главное меню", CallbackAction::MainMenu)]);
  InlineKeyboardMarkup::new(rows)
}

pub fn back_keyboard() -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![vec![button("⬅️ Назад", CallbackAction::CheckoutBack)]])
}

pub fn back_or_skip_keyboard() -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![vec![
    button("⬅️ Назад", CallbackAction::CheckoutBack),
    button("Пропустить ➡️", CallbackAction::CheckoutSkip),
  ]])
}

pub fn confirmation_keyboard() -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![
    vec![button("✅ Подтвердить", CallbackAction::ConfirmOrder)],
    vec![
      button("✏️ Изменить", CallbackAction::EditOrder),
      button("⬅️ Назад", CallbackAction::CheckoutBack),
    ],
  ])
}

pub fn edit_choice_keyboard() -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![
    vec![button("📍 Адрес", CallbackAction::EditField(CheckoutField::Address))],
    vec![button("📞 Телефон", CallbackAction::EditField(CheckoutField::Phone))],
    vec![button("💬 Пожелания", CallbackAction::EditField(CheckoutField::Wishes))],
    vec![button("🕐 Время доставки", CallbackAction::EditField(CheckoutField::DeliveryTime))],
    vec![button("⬅️ К подтверждению", CallbackAction::BackToConfirmation)],
  ])
}

pub fn payment_keyboard(confirmation_url: &str, order_id: i64) -> InlineKeyboardMarkup {
  let mut rows = Vec::new();
  if let Ok(url) = confirmation_url.parse() {
    rows.push(vec![InlineKeyboardButton::url("💳 Оплатить".to_string(), url)]);
  }
  rows.push(vec![button("🔄 Проверить оплату", CallbackAction::CheckPayment { order_id })]);
  rows.push(vec![button("⬅️ Главное меню", CallbackAction::MainMenu)]);
  InlineKeyboardMarkup::new(rows)
}

pub fn after_payment_keyboard() -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![
    vec![button("🛍 В каталог", CallbackAction::CategoryList { parent: None, page: 1 })],
    vec![button("⬅️ Главное меню", CallbackAction::MainMenu)],
  ])
}

pub fn check_payment_keyboard(order_id: i64) -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![
    vec![button("🔄 Проверить оплату", CallbackAction::CheckPayment { order_id })],
    vec![button("⬅️ Главное меню", CallbackAction::MainMenu)],
  ])
}

pub fn faq_list_keyboard(items: &[FaqRow], page: u64, total_pages: u64) -> InlineKeyboardMarkup {
  let mut rows: Vec<Vec<InlineKeyboardButton>> = items
    .iter()
    .map(|item| {
      vec![button(
        truncate_button_text(&item.question, BUTTON_TEXT_LIMIT),
        CallbackAction::FaqItem { item_id: item.id, page },
      )]
    })
    .collect();

  if let Some(nav) = nav_row(
    page,
    total_pages,
    CallbackAction::FaqPage { page: page - 1 },
    CallbackAction::FaqPage { page: page + 1 },
  ) {
    rows.push(nav);
  }
  rows.push(vec![button("🔍 Задать вопрос", CallbackAction::AskQuestion)]);
  rows.push(vec![button("⬅️ Главное меню", CallbackAction::MainMenu)]);
  InlineKeyboardMarkup::new(rows)
}

pub fn faq_item_keyboard(page: u64) -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![vec![button("⬅️ К вопросам", CallbackAction::FaqPage { page })]])
}

pub fn faq_search_keyboard(items: &[FaqRow], query: &str, page: u64, total_pages: u64) -> InlineKeyboardMarkup {
  let mut rows: Vec<Vec<InlineKeyboardButton>> = items
    .iter()
    .map(|item| {
      vec![button(
        truncate_button_text(&item.question, BUTTON_TEXT_LIMIT),
        CallbackAction::FaqItem { item_id: item.id, page: 1 },
      )]
    })
    .collect();

  if let Some(nav) = nav_row(
    page,
    total_pages,
    CallbackAction::SearchPage {
      page: page - 1,
      query: query.to_string(),
    },
    CallbackAction::SearchPage {
      page: page + 1,
      query: query.to_string(),
    },
  ) {
    rows.push(nav);
  }
  rows.push(vec![button("⬅️ К вопросам", CallbackAction::FaqPage { page: 1 })]);
  InlineKeyboardMarkup::new(rows)
}

pub fn profile_keyboard() -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![vec![button("⬅️ Главное меню", CallbackAction::MainMenu)]])
}

pub fn admin_menu_keyboard() -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![
    vec![button("📋 Последние заказы", CallbackAction::AdminOrders)],
    vec![
      button("📤 Экспорт товаров (JSON)", CallbackAction::AdminExportProducts { csv: false }),
      button("📤 Экспорт товаров (CSV)", CallbackAction::AdminExportProducts { csv: true }),
    ],
    vec![button("📥 Импорт товаров", CallbackAction::AdminImportProducts)],
    vec![button("📤 Экспорт заказов (CSV)", CallbackAction::AdminExportOrders)],
    vec![
      button("🗂 Товар вкл/выкл", CallbackAction::AdminToggleProduct),
      button("🗂 FAQ вкл/выкл", CallbackAction::AdminToggleFaq),
    ],
    vec![button("⬅️ Главное меню", CallbackAction::MainMenu)],
  ])
}

pub fn admin_orders_keyboard(orders: &[crate::models::OrderRow]) -> InlineKeyboardMarkup {
  let mut rows: Vec<Vec<InlineKeyboardButton>> = orders
    .iter()
    .map(|order| {
      let label = format!("№{} — {}", order.id, order.status.label());
      vec![button(
        truncate_button_text(&label, BUTTON_TEXT_LIMIT),
        CallbackAction::AdminOrder { order_id: order.id },
      )]
    })
    .collect();
  rows.push(vec![button("⬅️ Назад", CallbackAction::AdminMenu)]);
  InlineKeyboardMarkup::new(rows)
}

pub fn order_status_keyboard(order_id: i64) -> InlineKeyboardMarkup {
  let mut rows: Vec<Vec<InlineKeyboardButton>> = OrderStatus::ALL
    .iter()
    .map(|status| vec![button(status.label(), CallbackAction::AdminSetStatus { order_id, status: *status })])
    .collect();
  rows.push(vec![button("⬅️ Назад", CallbackAction::AdminOrders)]);
  InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::CartLine;

  fn line(product_id: i64, name: &str, price: i64, quantity: i32) -> CartLine {
    CartLine {
      product_id,
      name: name.to_string(),
      price,
      quantity,
    }
  }

  #[test]
  fn nav_row_hides_on_single_page() {
    assert!(nav_row(1, 1, CallbackAction::Noop, CallbackAction::Noop).is_none());
  }

  #[test]
  fn nav_row_drops_edge_arrows() {
    let first = nav_row(
      1,
      3,
      CallbackAction::ShowCart { page: 0 },
      CallbackAction::ShowCart { page: 2 },
    )
    .expect("multiple pages");
    assert_eq!(first.len(), 2);

    let middle = nav_row(
      2,
      3,
      CallbackAction::ShowCart { page: 1 },
      CallbackAction::ShowCart { page: 3 },
    )
    .expect("multiple pages");
    assert_eq!(middle.len(), 3);
  }

  #[test]
  fn main_menu_shows_cart_total_when_not_empty() {
    let keyboard = main_menu_keyboard(3, 25000, false);
    let labels: Vec<String> = keyboard
      .inline_keyboard
      .iter()
      .flatten()
      .map(|b| b.text.clone())
      .collect();
    assert!(labels.iter().any(|label| label.contains("250.00")));
    assert!(!labels.iter().any(|label| label.contains("Админ")));
  }

  #[test]
  fn main_menu_adds_admin_entry_for_admins() {
    let keyboard = main_menu_keyboard(0, 0, true);
    let labels: Vec<String> = keyboard
      .inline_keyboard
      .iter()
      .flatten()
      .map(|b| b.text.clone())
      .collect();
    assert!(labels.iter().any(|label| label.contains("Админ")));
  }

  #[test]
  fn empty_cart_has_no_checkout_button() {
    let keyboard = cart_keyboard(&[], 1, 1);
    let labels: Vec<String> = keyboard
      .inline_keyboard
      .iter()
      .flatten()
      .map(|b| b.text.clone())
      .collect();
    assert!(!labels.iter().any(|label| label.contains("Оформить")));
  }

  #[test]
  fn cart_rows_carry_quantity_controls() {
    let keyboard = cart_keyboard(&[line(1, "Rose", 19990, 2)], 1, 1);
    let labels: Vec<String> = keyboard
      .inline_keyboard
      .iter()
      .flatten()
      .map(|b| b.text.clone())
      .collect();
    assert!(labels.contains(&"➖".to_string()));
    assert!(labels.contains(&"➕".to_string()));
    assert!(labels.iter().any(|label| label.contains("Оформить")));
  }

  #[test]
  fn order_status_keyboard_lists_every_status() {
    let keyboard = order_status_keyboard(7);
    // four statuses plus the back row
    assert_eq!(keyboard.inline_keyboard.len(), 5);
  }
}
