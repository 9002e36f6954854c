use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use crate::config::Config;
use crate::config::PageSizes;
use crate::db::Db;
use crate::payments::PaymentClient;

#[derive(Clone)]
pub struct AppContext {
  db: Db,
  admins: HashSet<i64>,
  support_chat_id: Option<i64>,
  subscription_channel_id: Option<i64>,
  subscription_group_id: Option<i64>,
  media_root: PathBuf,
  pages: PageSizes,
  payments: Option<PaymentClient>,
}

impl AppContext {
  pub fn new(db: Db, config: &Config) -> Self {
    Self {
      db,
      admins: config.admins.iter().copied().collect(),
      support_chat_id: config.support_chat_id,
      subscription_channel_id: config.subscription_channel_id,
      subscription_group_id: config.subscription_group_id,
      media_root: config.media_root.clone(),
      pages: config.pages,
      payments: config.payments.clone().map(PaymentClient::new),
    }
  }

  pub fn db(&self) -> &Db {
    &self.db
  }

  pub fn is_admin(&self, tg_id: i64) -> bool {
    self.admins.contains(&tg_id)
  }

  pub fn support_chat_id(&self) -> Option<i64> {
    self.support_chat_id
  }

  pub fn subscription_channel_id(&self) -> Option<i64> {
    self.subscription_channel_id
  }

  pub fn subscription_group_id(&self) -> Option<i64> {
    self.subscription_group_id
  }

  pub fn media_root(&self) -> &Path {
    &self.media_root
  }

  pub fn pages(&self) -> PageSizes {
    self.pages
  }

  pub fn payments(&self) -> Option<&PaymentClient> {
    self.payments.as_ref()
  }
}
