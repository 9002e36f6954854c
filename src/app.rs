use std::sync::Arc;

use teloxide::dispatching::UpdateHandler;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dptree;
use teloxide::prelude::*;

use crate::bot;
use crate::bot::AppContext;
use crate::bot::DialogueStorage;
use crate::config::Config;
use crate::db::Db;
use crate::notifier;

pub struct App {
  bot: Bot,
  db: Db,
  context: Arc<AppContext>,
  handler: UpdateHandler<anyhow::Error>,
}

impl App {
  pub fn new(bot: Bot, db: Db, config: &Config) -> Self {
    let context = Arc::new(AppContext::new(db.clone(), config));
    let handler = bot::build_schema();
    Self {
      bot,
      db,
      context,
      handler,
    }
  }

  pub async fn run(self) -> anyhow::Result<()> {
    let storage: Arc<DialogueStorage> = InMemStorage::new();

    let me = self.bot.get_me().await?;
    let notifier_task = notifier::spawn(self.bot.clone(), self.db.clone());

    Dispatcher::builder(self.bot.clone(), self.handler)
      .dependencies(dptree::deps![self.context.clone(), storage.clone(), me])
      .enable_ctrlc_handler()
      .build()
      .dispatch()
      .await;

    notifier_task.abort();
    Ok(())
  }
}
