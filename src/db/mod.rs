pub mod cart;
pub mod catalog;
pub mod faq;
pub mod orders;
pub mod users;

use anyhow::Result;
use sqlx::Pool;
use sqlx::Postgres;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct Db {
  pool: Pool<Postgres>,
}

impl Db {
  pub async fn connect(database_url: &str) -> Result<Self> {
    let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
    MIGRATOR.run(&pool).await?;
    Ok(Self { pool })
  }

  pub fn pool(&self) -> &Pool<Postgres> {
    &self.pool
  }
}
