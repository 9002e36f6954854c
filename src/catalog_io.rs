//! Bulk catalog import/export for the admin panel: products in and out as
//! JSON or CSV, orders out as CSV.

use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::instrument;

use crate::db::Db;
use crate::models::OrderLine;
use crate::models::OrderRow;
use crate::models::ProductRow;
use crate::util::format_kopecks;
use crate::util::parse_money_to_kopecks;

/// One product row as it appears in an import/export file. Prices travel as
/// "123.45" decimal strings, categories as "A > B > C" paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
  pub name: String,
  #[serde(default)]
  pub description: String,
  pub price: String,
  pub category_path: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub photo_filename: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
  Json,
  Csv,
}

impl FileFormat {
  pub fn from_filename(name: &str) -> Option<Self> {
    let lower = name.to_lowercase();
    if lower.ends_with(".json") {
      Some(Self::Json)
    } else if lower.ends_with(".csv") {
      Some(Self::Csv)
    } else {
      None
    }
  }
}

pub fn parse_products(format: FileFormat, data: &[u8]) -> Result<Vec<ProductRecord>> {
  match format {
    FileFormat::Json => serde_json::from_slice(data).context("malformed JSON product file"),
    FileFormat::Csv => {
      let mut reader = csv::Reader::from_reader(data);
      let mut records = Vec::new();
      for row in reader.deserialize() {
        let record: ProductRecord = row.context("malformed CSV product row")?;
        records.push(record);
      }
      Ok(records)
    },
  }
}

pub fn products_to_json(records: &[ProductRecord]) -> Result<Vec<u8>> {
  Ok(serde_json::to_vec_pretty(records)?)
}

pub fn products_to_csv(records: &[ProductRecord]) -> Result<Vec<u8>> {
  let mut writer = csv::Writer::from_writer(Vec::new());
  for record in records {
    writer.serialize(record)?;
  }
  Ok(writer.into_inner()?)
}

pub fn export_record(product: &ProductRow, category_path: &[String]) -> ProductRecord {
  ProductRecord {
    name: product.name.clone(),
    description: product.description.clone(),
    price: format!("{}.{:02}", product.price / 100, product.price % 100),
    category_path: category_path.join(" > "),
    photo_filename: product.photo.clone(),
  }
}

#[derive(Debug, Default)]
pub struct ImportReport {
  pub imported: usize,
  pub errors: Vec<String>,
}

impl ImportReport {
  pub fn summary(&self) -> String {
    let mut text = format!("Импортировано товаров: {}.", self.imported);
    if !self.errors.is_empty() {
      text.push_str(&format!("\nОшибки ({}):", self.errors.len()));
      for error in &self.errors {
        text.push('\n');
        text.push_str(error);
      }
    }
    text
  }
}

/// Inserts the parsed records, resolving each category path segment by
/// segment (get-or-create) and checking photo files under `media_root`.
/// Bad rows are reported, good rows still land.
#[instrument(skip(db, media_root, records))]
pub async fn import_products(db: &Db, media_root: &Path, records: &[ProductRecord]) -> Result<ImportReport> {
  let mut report = ImportReport::default();

  for (index, record) in records.iter().enumerate() {
    let row_number = index + 1;
    match import_one(db, media_root, record).await {
      Ok(()) => report.imported += 1,
      Err(err) => report.errors.push(format!("строка {row_number}: {err}")),
    }
  }

  info!(imported = report.imported, errors = report.errors.len(), "product import finished");
  Ok(report)
}

async fn import_one(db: &Db, media_root: &Path, record: &ProductRecord) -> Result<()> {
  if record.name.trim().is_empty() {
    bail!("поле 'name' обязательно");
  }
  if record.category_path.trim().is_empty() {
    bail!("поле 'category_path' обязательно");
  }

  let price = parse_money_to_kopecks(&record.price).map_err(|err| anyhow::anyhow!("цена '{}': {err}", record.price))?;

  let photo = match record.photo_filename.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
    Some(filename) => {
      if !media_root.join(filename).is_file() {
        bail!("файл фотографии '{filename}' не найден");
      }
      Some(filename.to_string())
    },
    None => None,
  };

  let category_id = resolve_category_path(db, &record.category_path).await?;
  db.create_product(category_id, record.name.trim(), record.description.trim(), price, photo.as_deref())
    .await?;
  Ok(())
}

/// Walks "A > B > C" from the root, creating missing segments, and returns
/// the leaf category id.
async fn resolve_category_path(db: &Db, path: &str) -> Result<i64> {
  let mut parent_id: Option<i64> = None;
  let mut resolved = None;

  for segment in split_category_path(path) {
    let category_id = match db.find_child_category(parent_id, &segment).await? {
      Some(category) => category.id,
      None => db.create_category(parent_id, &segment).await?,
    };
    parent_id = Some(category_id);
    resolved = Some(category_id);
  }

  resolved.ok_or_else(|| anyhow::anyhow!("пустой путь категории '{path}'"))
}

fn split_category_path(path: &str) -> Vec<String> {
  path
    .split('>')
    .map(str::trim)
    .filter(|segment| !segment.is_empty())
    .map(str::to_string)
    .collect()
}

#[derive(Debug, Serialize)]
struct OrderExportRow<'a> {
  order_id: i64,
  user_id: i64,
  created_at: String,
  address: &'a str,
  phone: &'a str,
  status: &'static str,
  paid: bool,
  total: String,
  items: String,
}

pub fn orders_to_csv(orders: &[(OrderRow, Vec<OrderLine>)]) -> Result<Vec<u8>> {
  let mut writer = csv::Writer::from_writer(Vec::new());
  for (order, lines) in orders {
    let items = lines
      .iter()
      .map(|line| format!("{} x {}", line.name, line.quantity))
      .collect::<Vec<_>>()
      .join(", ");
    writer.serialize(OrderExportRow {
      order_id: order.id,
      user_id: order.user_id,
      created_at: order.created_at.format("%Y-%m-%d %H:%M").to_string(),
      address: &order.address,
      phone: &order.phone,
      status: order.status.as_str(),
      paid: order.is_paid,
      total: format_kopecks(order.total),
      items,
    })?;
  }
  Ok(writer.into_inner()?)
}

#[cfg(test)]
mod tests {
  use super::FileFormat;
  use super::ProductRecord;
  use super::parse_products;
  use super::products_to_csv;
  use super::products_to_json;
  use super::split_category_path;

  fn record(name: &str, price: &str, path: &str) -> ProductRecord {
    ProductRecord {
      name: name.to_string(),
      description: String::new(),
      price: price.to_string(),
      category_path: path.to_string(),
      photo_filename: None,
    }
  }

  #[test]
  fn detects_format_from_filename() {
    assert_eq!(FileFormat::from_filename("products.json"), Some(FileFormat::Json));
    assert_eq!(FileFormat::from_filename("Products.CSV"), Some(FileFormat::Csv));
    assert_eq!(FileFormat::from_filename("products.xlsx"), None);
  }

  #[test]
  fn parses_json_records() {
    let data = br#"[{"name": "Rose", "price": "199.90", "category_path": "Flowers > Roses"}]"#;
    let records = parse_products(FileFormat::Json, data).expect("valid json");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "Rose");
    assert_eq!(records[0].description, "");
    assert!(records[0].photo_filename.is_none());
  }

  #[test]
  fn parses_csv_records() {
    let data = b"name,description,price,category_path,photo_filename\nRose,Red rose,199.90,Flowers > Roses,rose.png\n";
    let records = parse_products(FileFormat::Csv, data).expect("valid csv");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].description, "Red rose");
    assert_eq!(records[0].photo_filename.as_deref(), Some("rose.png"));
  }

  #[test]
  fn rejects_malformed_json() {
    assert!(parse_products(FileFormat::Json, b"{not json").is_err());
  }

  #[test]
  fn splits_category_paths() {
    assert_eq!(split_category_path("A > B > C"), vec!["A", "B", "C"]);
    assert_eq!(split_category_path("Single"), vec!["Single"]);
    assert!(split_category_path(" > > ").is_empty());
  }

  #[test]
  fn json_export_round_trips() {
    let records = vec![record("Rose", "199.90", "Flowers > Roses")];
    let data = products_to_json(&records).expect("serializes");
    let parsed = parse_products(FileFormat::Json, &data).expect("parses back");
    assert_eq!(parsed, records);
  }

  #[test]
  fn csv_export_round_trips() {
    let records = vec![record("Rose", "199.90", "Flowers > Roses")];
    let data = products_to_csv(&records).expect("serializes");
    let parsed = parse_products(FileFormat::Csv, &data).expect("parses back");
    assert_eq!(parsed, records);
  }
}
