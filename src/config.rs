use std::env;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct Config {
  pub bot_token: String,
  pub database_url: String,
  pub admins: Vec<i64>,
  pub support_chat_id: Option<i64>,
  pub subscription_channel_id: Option<i64>,
  pub subscription_group_id: Option<i64>,
  pub media_root: PathBuf,
  pub payments: Option<PaymentConfig>,
  pub pages: PageSizes,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
  pub shop_id: String,
  pub secret_key: String,
  pub return_url: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PageSizes {
  pub categories: u64,
  pub products: u64,
  pub cart_items: u64,
  pub faq: u64,
}

impl Default for PageSizes {
  fn default() -> Self {
    Self {
      categories: 5,
      products: 5,
      cart_items: 5,
      faq: 5,
    }
  }
}

impl Config {
  pub fn from_env() -> Result<Self> {
    let bot_token = env::var("BOT_TOKEN")
      .or_else(|_| env::var("TELOXIDE_TOKEN"))
      .context("BOT_TOKEN or TELOXIDE_TOKEN must be set")?;
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let admins = parse_admins(&env::var("ADMIN_IDS").unwrap_or_default());
    let support_chat_id = parse_chat_id("SUPPORT_CHAT_ID");
    let subscription_channel_id = parse_chat_id("SUBSCRIPTION_CHANNEL_ID");
    let subscription_group_id = parse_chat_id("SUBSCRIPTION_GROUP_ID");
    let media_root = env::var("MEDIA_ROOT").map(PathBuf::from).unwrap_or_else(|_| "media".into());

    let payments = match (env::var("YOOKASSA_SHOP_ID"), env::var("YOOKASSA_SECRET_KEY")) {
      (Ok(shop_id), Ok(secret_key)) => Some(PaymentConfig {
        shop_id,
        secret_key,
        return_url: env::var("YOOKASSA_RETURN_URL")
          .unwrap_or_else(|_| "https://example.com/payment-callback/".to_string()),
      }),
      _ => None,
    };

    let pages = PageSizes {
      categories: parse_page_size("CATEGORIES_PER_PAGE", 5),
      products: parse_page_size("PRODUCTS_PER_PAGE", 5),
      cart_items: parse_page_size("CART_ITEMS_PER_PAGE", 5),
      faq: parse_page_size("FAQ_PER_PAGE", 5),
    };

    Ok(Self {
      bot_token,
      database_url,
      admins,
      support_chat_id,
      subscription_channel_id,
      subscription_group_id,
      media_root,
      payments,
      pages,
    })
  }
}

fn parse_admins(raw: &str) -> Vec<i64> {
  raw
    .split(',')
    .filter_map(|id| {
      let trimmed = id.trim();
      if trimmed.is_empty() {
        return None;
      }
      match trimmed.parse::<i64>() {
        Ok(value) => Some(value),
        Err(err) => {
          tracing::warn!(value = trimmed, error = %err, "invalid ADMIN_IDS entry");
          None
        },
      }
    })
    .collect()
}

fn parse_chat_id(var: &str) -> Option<i64> {
  let raw = env::var(var).ok()?;
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }
  match trimmed.parse::<i64>() {
    Ok(value) => Some(value),
    Err(err) => {
      tracing::warn!(var, value = trimmed, error = %err, "ignoring unparsable chat id");
      None
    },
  }
}

fn parse_page_size(var: &str, default: u64) -> u64 {
  match env::var(var) {
    Ok(raw) => match raw.trim().parse::<u64>() {
      Ok(value) if value > 0 => value,
      _ => {
        tracing::warn!(var, value = raw, "ignoring invalid page size");
        default
      },
    },
    Err(_) => default,
  }
}

#[cfg(test)]
mod tests {
  use super::PageSizes;
  use super::parse_admins;

  #[test]
  fn parses_valid_admins() {
    let admins = parse_admins("1, 2 ,3");
    assert_eq!(admins, vec![1, 2, 3]);
  }

  #[test]
  fn skips_invalid_entries() {
    let admins = parse_admins("42,abc,  7");
    assert_eq!(admins, vec![42, 7]);
  }

  #[test]
  fn empty_input_yields_empty_list() {
    let admins = parse_admins("");
    assert!(admins.is_empty());
  }

  #[test]
  fn default_page_sizes() {
    let pages = PageSizes::default();
    assert_eq!(pages.categories, 5);
    assert_eq!(pages.faq, 5);
  }
}
