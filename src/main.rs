mod app;
mod bot;
mod catalog_io;
mod config;
mod db;
mod models;
mod notifier;
mod payments;
mod telemetry;
mod util;

use anyhow::Result;
use teloxide::prelude::Bot;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
  telemetry::init()?;
  let config = config::Config::from_env()?;
  let admin_count = config.admins.len();
  let payments_enabled = config.payments.is_some();
  info!(admin_count, payments_enabled, "starting bot");

  let bot = Bot::new(config.bot_token.clone());
  let db = db::Db::connect(&config.database_url).await?;
  let app = app::App::new(bot, db, &config);
  app.run().await
}
