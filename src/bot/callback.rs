//! Typed callback payloads. Every inline button encodes one of these
//! actions; incoming callback data is decoded once at the dispatch boundary
//! instead of ad-hoc string splitting inside handlers.

use crate::models::OrderStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
  MainMenu,
  /// Page of child categories under `parent` (`None` = roots).
  CategoryList { parent: Option<i64>, page: u64 },
  /// Open a category: children when it has any, its products otherwise.
  OpenCategory { category_id: i64, page: u64 },
  ProductList { category_id: i64, page: u64 },
  ShowProduct { product_id: i64 },
  AddToCart { product_id: i64 },
  ShowCart { page: u64 },
  IncreaseItem { product_id: i64 },
  DecreaseItem { product_id: i64 },
  RemoveItem { product_id: i64 },
  ClearCart,
  StartCheckout,
  CheckoutBack,
  CheckoutSkip,
  ConfirmOrder,
  EditOrder,
  EditField(CheckoutField),
  BackToConfirmation,
  FaqList,
  FaqPage { page: u64 },
  /// `page` is the FAQ list page to return to from the answer view.
  FaqItem { item_id: i64, page: u64 },
  AskQuestion,
  SearchPage { page: u64, query: String },
  CheckPayment { order_id: i64 },
  Profile,
  AdminMenu,
  AdminOrders,
  AdminOrder { order_id: i64 },
  AdminSetStatus { order_id: i64, status: OrderStatus },
  AdminExportProducts { csv: bool },
  AdminExportOrders,
  AdminImportProducts,
  AdminToggleProduct,
  AdminToggleFaq,
  Noop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutField {
  Address,
  Phone,
  Wishes,
  DeliveryTime,
}

impl CheckoutField {
  fn as_str(self) -> &'static str {
    match self {
      Self::Address => "address",
      Self::Phone => "phone",
      Self::Wishes => "wishes",
      Self::DeliveryTime => "delivery_time",
    }
  }

  fn parse(value: &str) -> Option<Self> {
    match value {
      "address" => Some(Self::Address),
      "phone" => Some(Self::Phone),
      "wishes" => Some(Self::Wishes),
      "delivery_time" => Some(Self::DeliveryTime),
      _ => None,
    }
  }
}

fn parent_token(parent: Option<i64>) -> String {
  match parent {
    Some(id) => id.to_string(),
    None => "root".to_string(),
  }
}

fn parse_parent(token: &str) -> Option<Option<i64>> {
  if token == "root" {
    return Some(None);
  }
  token.parse::<i64>().ok().map(Some)
}

/// Search queries ride inside callback data; underscores are escaped the
/// same way the previous implementation did it.
fn encode_query(query: &str) -> String {
  query.replace('_', "##")
}

fn decode_query(encoded: &str) -> String {
  encoded.replace("##", "_")
}

impl CallbackAction {
  pub fn encode(&self) -> String {
    match self {
      Self::MainMenu => "menu:root".to_string(),
      Self::CategoryList { parent, page } => format!("cat:{}:{page}", parent_token(*parent)),
      Self::OpenCategory { category_id, page } => format!("open:{category_id}:{page}"),
      Self::ProductList { category_id, page } => format!("prod:{category_id}:{page}"),
      Self::ShowProduct { product_id } => format!("item:{product_id}"),
      Self::AddToCart { product_id } => format!("add:{product_id}"),
      Self::ShowCart { page } => format!("cart:{page}"),
      Self::IncreaseItem { product_id } => format!("inc:{product_id}"),
      Self::DecreaseItem { product_id } => format!("dec:{product_id}"),
      Self::RemoveItem { product_id } => format!("del:{product_id}"),
      Self::ClearCart => "clear".to_string(),
      Self::StartCheckout => "checkout".to_string(),
      Self::CheckoutBack => "back".to_string(),
      Self::CheckoutSkip => "skip".to_string(),
      Self::ConfirmOrder => "confirm".to_string(),
      Self::EditOrder => "edit".to_string(),
      Self::EditField(field) => format!("editfield:{}", field.as_str()),
      Self::BackToConfirmation => "toconfirm".to_string(),
      Self::FaqList => "faq".to_string(),
      Self::FaqPage { page } => format!("faqpage:{page}"),
      Self::FaqItem { item_id, page } => format!("faqitem:{item_id}:{page}"),
      Self::AskQuestion => "ask".to_string(),
      Self::SearchPage { page, query } => format!("searchpage:{page}:{}", encode_query(query)),
      Self::CheckPayment { order_id } => format!("check_payment:{order_id}"),
      Self::Profile => "profile".to_string(),
      Self::AdminMenu => "admin:menu".to_string(),
      Self::AdminOrders => "admin:orders".to_string(),
      Self::AdminOrder { order_id } => format!("admin:order:{order_id}"),
      Self::AdminSetStatus { order_id, status } => format!("admin:status:{order_id}:{}", status.as_str()),
      Self::AdminExportProducts { csv } => {
        format!("admin:export_products:{}", if *csv { "csv" } else { "json" })
      },
      Self::AdminExportOrders => "admin:export_orders".to_string(),
      Self::AdminImportProducts => "admin:import".to_string(),
      Self::AdminToggleProduct => "admin:toggle_product".to_string(),
      Self::AdminToggleFaq => "admin:toggle_faq".to_string(),
      Self::Noop => "noop".to_string(),
    }
  }

  pub fn parse(data: &str) -> Option<Self> {
    let (prefix, rest) = match data.split_once(':') {
      Some((prefix, rest)) => (prefix, Some(rest)),
      None => (data, None),
    };

    match (prefix, rest) {
      ("menu", Some("root")) => Some(Self::MainMenu),
      ("cat", Some(rest)) => {
        let (parent, page) = rest.split_once(':')?;
        Some(Self::CategoryList {
          parent: parse_parent(parent)?,
          page: page.parse().ok()?,
        })
      },
      ("open", Some(rest)) => {
        let (id, page) = rest.split_once(':')?;
        Some(Self::OpenCategory {
          category_id: id.parse().ok()?,
          page: page.parse().ok()?,
        })
      },
      ("prod", Some(rest)) => {
        let (id, page) = rest.split_once(':')?;
        Some(Self::ProductList {
          category_id: id.parse().ok()?,
          page: page.parse().ok()?,
        })
      },
      ("item", Some(id)) => Some(Self::ShowProduct {
        product_id: id.parse().ok()?,
      }),
      ("add", Some(id)) => Some(Self::AddToCart {
        product_id: id.parse().ok()?,
      }),
      ("cart", Some(page)) => Some(Self::ShowCart { page: page.parse().ok()? }),
      ("inc", Some(id)) => Some(Self::IncreaseItem {
        product_id: id.parse().ok()?,
      }),
      ("dec", Some(id)) => Some(Self::DecreaseItem {
        product_id: id.parse().ok()?,
      }),
      ("del", Some(id)) => Some(Self::RemoveItem {
        product_id: id.parse().ok()?,
      }),
      ("clear", None) => Some(Self::ClearCart),
      ("checkout", None) => Some(Self::StartCheckout),
      ("back", None) => Some(Self::CheckoutBack),
      ("skip", None) => Some(Self::CheckoutSkip),
      ("confirm", None) => Some(Self::ConfirmOrder),
      ("edit", None) => Some(Self::EditOrder),
      ("editfield", Some(field)) => CheckoutField::parse(field).map(Self::EditField),
      ("toconfirm", None) => Some(Self::BackToConfirmation),
      ("faq", None) => Some(Self::FaqList),
      ("faqpage", Some(page)) => Some(Self::FaqPage { page: page.parse().ok()? }),
      ("faqitem", Some(rest)) => {
        let (id, page) = rest.split_once(':')?;
        Some(Self::FaqItem {
          item_id: id.parse().ok()?,
          page: page.parse().ok()?,
        })
      },
      ("ask", None) => Some(Self::AskQuestion),
      ("searchpage", Some(rest)) => {
        let (page, query) = rest.split_once(':')?;
        Some(Self::SearchPage {
          page: page.parse().ok()?,
          query: decode_query(query),
        })
      },
      ("check_payment", Some(id)) => Some(Self::CheckPayment {
        order_id: id.parse().ok()?,
      }),
      ("profile", None) => Some(Self::Profile),
      ("admin", Some(rest)) => Self::parse_admin(rest),
      ("noop", None) => Some(Self::Noop),
      _ => None,
    }
  }

  fn parse_admin(rest: &str) -> Option<Self> {
    match rest {
      "menu" => return Some(Self::AdminMenu),
      "orders" => return Some(Self::AdminOrders),
      "export_orders" => return Some(Self::AdminExportOrders),
      "import" => return Some(Self::AdminImportProducts),
      "toggle_product" => return Some(Self::AdminToggleProduct),
      "toggle_faq" => return Some(Self::AdminToggleFaq),
      _ => {},
    }

    if let Some((action, value)) = rest.split_once(':') {
      match action {
        "order" => {
          return Some(Self::AdminOrder {
            order_id: value.parse().ok()?,
          });
        },
        "status" => {
          let (order_id, status) = value.split_once(':')?;
          return Some(Self::AdminSetStatus {
            order_id: order_id.parse().ok()?,
            status: OrderStatus::parse(status)?,
          });
        },
        "export_products" => {
          return match value {
            "csv" => Some(Self::AdminExportProducts { csv: true }),
            "json" => Some(Self::AdminExportProducts { csv: false }),
            _ => None,
          };
        },
        _ => {},
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::CallbackAction;
  use super::CheckoutField;
  use crate::models::OrderStatus;

  #[test]
  fn round_trips_navigation_actions() {
    let actions = [
      CallbackAction::MainMenu,
      CallbackAction::CategoryList { parent: None, page: 1 },
      CallbackAction::CategoryList {
        parent: Some(7),
        page: 3,
      },
      CallbackAction::OpenCategory {
        category_id: 7,
        page: 1,
      },
      CallbackAction::ProductList {
        category_id: 7,
        page: 2,
      },
      CallbackAction::ShowProduct { product_id: 12 },
      CallbackAction::AddToCart { product_id: 12 },
      CallbackAction::ShowCart { page: 2 },
      CallbackAction::IncreaseItem { product_id: 12 },
      CallbackAction::DecreaseItem { product_id: 12 },
      CallbackAction::RemoveItem { product_id: 12 },
      CallbackAction::ClearCart,
      CallbackAction::StartCheckout,
      CallbackAction::CheckoutBack,
      CallbackAction::CheckoutSkip,
      CallbackAction::ConfirmOrder,
      CallbackAction::EditOrder,
      CallbackAction::EditField(CheckoutField::Phone),
      CallbackAction::BackToConfirmation,
      CallbackAction::FaqList,
      CallbackAction::FaqPage { page: 4 },
      CallbackAction::FaqItem { item_id: 9, page: 2 },
      CallbackAction::AskQuestion,
      CallbackAction::CheckPayment { order_id: 33 },
      CallbackAction::Profile,
      CallbackAction::AdminMenu,
      CallbackAction::AdminOrders,
      CallbackAction::AdminOrder { order_id: 5 },
      CallbackAction::AdminSetStatus {
        order_id: 5,
        status: OrderStatus::OnWay,
      },
      CallbackAction::AdminExportProducts { csv: true },
      CallbackAction::AdminExportOrders,
      CallbackAction::AdminImportProducts,
      CallbackAction::AdminToggleProduct,
      CallbackAction::AdminToggleFaq,
      CallbackAction::Noop,
    ];

    for action in actions {
      let encoded = action.encode();
      assert_eq!(CallbackAction::parse(&encoded), Some(action), "{encoded}");
    }
  }

  #[test]
  fn search_queries_survive_underscores_and_colons() {
    let action = CallbackAction::SearchPage {
      page: 2,
      query: "how_to: pay".to_string(),
    };
    let encoded = action.encode();
    assert_eq!(CallbackAction::parse(&encoded), Some(action));
  }

  #[test]
  fn rejects_malformed_data() {
    assert_eq!(CallbackAction::parse(""), None);
    assert_eq!(CallbackAction::parse("cat"), None);
    assert_eq!(CallbackAction::parse("cat:root"), None);
    assert_eq!(CallbackAction::parse("cat:abc:1"), None);
    assert_eq!(CallbackAction::parse("item:NaN"), None);
    assert_eq!(CallbackAction::parse("admin:status:5:unknown"), None);
    assert_eq!(CallbackAction::parse("totally:unknown"), None);
  }
}
