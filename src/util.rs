use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static PRICE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:[.,]\d{1,2})?$").expect("valid regex"));

static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?\d{10,15}$").expect("valid regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
  #[error("amount must match 0.00 format")]
  InvalidFormat,
  #[error("amount exceeds supported range")]
  OutOfRange,
}

/// Parses a decimal ruble amount ("199", "199.9", "199,90") into kopecks.
pub fn parse_money_to_kopecks(input: &str) -> Result<i64, MoneyError> {
  let trimmed = input.trim();
  if !PRICE_PATTERN.is_match(trimmed) {
    return Err(MoneyError::InvalidFormat);
  }

  let normalized = trimmed.replace(',', ".");
  let mut parts = normalized.split('.');
  let major = parts
    .next()
    .and_then(|p| p.parse::<i64>().ok())
    .ok_or(MoneyError::InvalidFormat)?;

  let minor = match parts.next() {
    None => 0,
    Some(minor) => {
      if minor.len() == 1 {
        (minor.to_owned() + "0")
          .parse::<i64>()
          .map_err(|_| MoneyError::OutOfRange)?
      } else {
        minor[.. 2].parse::<i64>().map_err(|_| MoneyError::OutOfRange)?
      }
    },
  };

  major
    .checked_mul(100)
    .and_then(|value| value.checked_add(minor))
    .ok_or(MoneyError::OutOfRange)
}

pub fn format_kopecks(amount: i64) -> String {
  format!("{:.2} ₽", (amount as f64) / 100.0)
}

pub fn is_valid_phone(input: &str) -> bool {
  PHONE_PATTERN.is_match(input.trim())
}

/// Total page count for `count` rows at `per_page` rows per page, never zero.
pub fn total_pages(count: u64, per_page: u64) -> u64 {
  if count == 0 {
    return 1;
  }
  count.div_ceil(per_page)
}

/// Clamps a 1-based page number into `[1, total]`.
pub fn clamp_page(page: u64, total: u64) -> u64 {
  page.clamp(1, total.max(1))
}

pub fn truncate_button_text(text: &str, max_chars: usize) -> String {
  if text.chars().count() <= max_chars {
    return text.to_string();
  }

  let guarded = max_chars.saturating_sub(3);
  if guarded == 0 {
    return "...".to_string();
  }

  let truncated: String = text.chars().take(guarded).collect();
  format!("{truncated}...")
}

#[cfg(test)]
mod tests {
  use super::MoneyError;
  use super::clamp_page;
  use super::format_kopecks;
  use super::is_valid_phone;
  use super::parse_money_to_kopecks;
  use super::total_pages;
  use super::truncate_button_text;

  #[test]
  fn parses_valid_amounts() {
    assert_eq!(parse_money_to_kopecks("199"), Ok(19900));
    assert_eq!(parse_money_to_kopecks("199.9"), Ok(19990));
    assert_eq!(parse_money_to_kopecks("199,95"), Ok(19995));
  }

  #[test]
  fn rejects_invalid_amounts() {
    assert_eq!(parse_money_to_kopecks("abc"), Err(MoneyError::InvalidFormat));
    assert_eq!(parse_money_to_kopecks("10.555"), Err(MoneyError::InvalidFormat));
    assert_eq!(parse_money_to_kopecks("-5"), Err(MoneyError::InvalidFormat));
  }

  #[test]
  fn formats_currency() {
    assert_eq!(format_kopecks(123450), "1234.50 ₽");
    assert_eq!(format_kopecks(5000), "50.00 ₽");
  }

  #[test]
  fn accepts_plausible_phone_numbers() {
    assert!(is_valid_phone("+79991234567"));
    assert!(is_valid_phone("89991234567"));
    assert!(is_valid_phone(" +79991234567 "));
  }

  #[test]
  fn rejects_malformed_phone_numbers() {
    assert!(!is_valid_phone("abc"));
    assert!(!is_valid_phone("+7 999 123-45-67"));
    assert!(!is_valid_phone("12345"));
  }

  #[test]
  fn computes_total_pages() {
    assert_eq!(total_pages(0, 5), 1);
    assert_eq!(total_pages(5, 5), 1);
    assert_eq!(total_pages(6, 5), 2);
    assert_eq!(total_pages(11, 5), 3);
  }

  #[test]
  fn clamps_out_of_range_pages() {
    assert_eq!(clamp_page(0, 3), 1);
    assert_eq!(clamp_page(2, 3), 2);
    assert_eq!(clamp_page(99, 3), 3);
    assert_eq!(clamp_page(7, 0), 1);
  }

  #[test]
  fn truncates_long_button_labels() {
    assert_eq!(truncate_button_text("short", 10), "short");
    assert_eq!(truncate_button_text("a very long label", 10), "a very ...");
  }
}
