//! FAQ table access.
//!
//! Every call borrows one pooled connection and hands it back when the guard
//! drops, on the error paths too. The pool connects lazily, so building a
//! `FaqStore` never touches the network.

use std::time::Duration;

use log::{ error, info, warn };
use sqlx::any::{ install_default_drivers, AnyPoolOptions, AnyRow };
use sqlx::{ AnyPool, Row };

use crate::error::StoreError;
use crate::models::faq::{ FaqEntry, Retrieval };

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct FaqSeed {
    pub question: &'static str,
    pub answer: &'static str,
}

pub const DEFAULT_FAQS: [FaqSeed; 4] = [
    FaqSeed {
        question: "What are your opening hours?",
        answer: "We are open Sunday to Thursday from 9:00 to 18:00, and on Friday from 9:00 to 13:00.",
    },
    FaqSeed {
        question: "Where are you located?",
        answer: "Our store is at 12 Herzl Street, Tel Aviv. Free parking is available behind the building.",
    },
    FaqSeed {
        question: "Do you offer delivery?",
        answer: "Yes. Orders above 200 NIS ship for free and usually arrive within 3 business days.",
    },
    FaqSeed {
        question: "What is your return policy?",
        answer: "Unused items can be returned within 14 days of purchase with the original receipt.",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn from_url(url: &str) -> Result<Self, StoreError> {
        let scheme = url.split(':').next().unwrap_or_default().to_ascii_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(StoreError::UnsupportedUrl(other.to_string())),
        }
    }

    fn create_table_sql(self) -> &'static str {
        match self {
            Dialect::Postgres =>
                "CREATE TABLE IF NOT EXISTS faqs (
                    id BIGSERIAL PRIMARY KEY,
                    question VARCHAR NOT NULL,
                    answer VARCHAR NOT NULL
                )",
            Dialect::Sqlite =>
                "CREATE TABLE IF NOT EXISTS faqs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    question TEXT NOT NULL,
                    answer TEXT NOT NULL
                )",
        }
    }

    fn table_exists_sql(self) -> &'static str {
        match self {
            Dialect::Postgres =>
                "SELECT COUNT(*) FROM information_schema.tables
                 WHERE table_name = 'faqs' AND table_schema = current_schema()",
            Dialect::Sqlite =>
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'faqs'",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    Created,
    AlreadyExists,
}

#[derive(Clone)]
pub struct FaqStore {
    pool: AnyPool,
    dialect: Dialect,
}

impl FaqStore {
    pub fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let dialect = Dialect::from_url(url)?;
        install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy(url)?;

        Ok(Self { pool, dialect })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Reads every FAQ in id order. Failures are logged and reported as
    /// `Retrieval::Unavailable` instead of an error.
    pub async fn fetch_all(&self) -> Retrieval {
        match self.try_fetch_all().await {
            Ok(rows) => Retrieval::Rows(rows),
            Err(e) => {
                warn!("Could not read FAQs, answering without context: {}", e);
                Retrieval::Unavailable(e.to_string())
            }
        }
    }

    async fn try_fetch_all(&self) -> Result<Vec<FaqEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query("SELECT id, question, answer FROM faqs ORDER BY id")
            .fetch_all(&mut *conn).await?;

        let entries = rows.iter().map(Self::row_to_faq).collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM faqs")
            .fetch_one(&mut *conn).await?;
        Ok(count)
    }

    pub async fn ensure_schema(&self) -> Result<SchemaState, StoreError> {
        let mut conn = self.pool.acquire().await?;

        let existing: i64 = sqlx::query_scalar(self.dialect.table_exists_sql())
            .fetch_one(&mut *conn).await?;
        if existing > 0 {
            info!("Table 'faqs' already exists");
            return Ok(SchemaState::AlreadyExists);
        }

        info!("Creating table 'faqs'");
        sqlx::query(self.dialect.create_table_sql()).execute(&mut *conn).await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS ix_faqs_question ON faqs (question)")
            .execute(&mut *conn).await?;
        info!("Table 'faqs' created");

        Ok(SchemaState::Created)
    }

    /// Inserts `rows` in one transaction when the table is empty. Returns the
    /// number of rows written, 0 if the table already had data.
    pub async fn seed_if_empty(&self, rows: &[FaqSeed]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        if self.dialect == Dialect::Postgres {
            // concurrent boots queue here instead of both seeing an empty table
            sqlx::query("LOCK TABLE faqs IN SHARE ROW EXCLUSIVE MODE").execute(&mut *tx).await?;
        }

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM faqs")
            .fetch_one(&mut *tx).await?;
        if existing > 0 {
            info!("Table 'faqs' holds {} rows, skipping seed", existing);
            tx.commit().await?;
            return Ok(0);
        }

        for row in rows {
            let inserted = sqlx::query("INSERT INTO faqs (question, answer) VALUES ($1, $2)")
                .bind(row.question)
                .bind(row.answer)
                .execute(&mut *tx).await;

            if let Err(e) = inserted {
                error!("Seeding FAQs failed, rolling back: {}", e);
                if let Err(rollback_err) = tx.rollback().await {
                    error!("Rollback of FAQ seed failed: {}", rollback_err);
                }
                return Err(e.into());
            }
        }
        tx.commit().await?;

        info!("Seeded {} FAQs", rows.len());
        Ok(rows.len())
    }

    /// Startup sequence: create the table if needed, then seed it if empty.
    /// Safe to run on every boot.
    pub async fn prepare(&self, seeds: &[FaqSeed]) -> Result<(SchemaState, usize), StoreError> {
        let schema = self.ensure_schema().await?;
        let seeded = self.seed_if_empty(seeds).await?;
        Ok((schema, seeded))
    }

    fn row_to_faq(row: &AnyRow) -> Result<FaqEntry, sqlx::Error> {
        Ok(FaqEntry {
            id: row.try_get("id")?,
            question: row.try_get("question")?,
            answer: row.try_get("answer")?,
        })
    }
}
