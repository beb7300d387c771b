//! SQLite observation store.
//!
//! Holds the same two tables the CSV directory format describes, so a CSV
//! data set can be imported once and reused as a persistent local cache.

use crate::domain::config_validation::{sqlite_pool_size, sqlite_timeout};
use crate::domain::error::WeightbenchError;
use crate::domain::observation::{FetchOutcome, Observation};
use crate::domain::stock::{InstrumentKind, Stock};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{OBSERVATION_LOOKAHEAD_DAYS, ObservationPort, UniversePort};
use chrono::{Duration as DateDuration, NaiveDate};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, Row, params};
use std::time::Duration;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, WeightbenchError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| WeightbenchError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = sqlite_pool_size(config)?;
        let timeout = sqlite_timeout(config)?;

        Self::open(&db_path, pool_size, timeout)
    }

    /// `timeout` bounds both pool checkout and SQLite's busy wait.
    pub fn open(path: &str, pool_size: u32, timeout: Duration) -> Result<Self, WeightbenchError> {
        let manager = SqliteConnectionManager::file(path).with_init(move |c| c.busy_timeout(timeout));
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_timeout(timeout.max(Duration::from_millis(1)))
            .build(manager)
            .map_err(|e: r2d2::Error| WeightbenchError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, WeightbenchError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| WeightbenchError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, WeightbenchError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| WeightbenchError::Database {
                reason: e.to_string(),
            })
    }

    pub fn initialize_schema(&self) -> Result<(), WeightbenchError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS stocks (
                    ticker TEXT PRIMARY KEY,
                    start_date TEXT NOT NULL,
                    end_date TEXT,
                    kind TEXT NOT NULL DEFAULT 'equity'
                );
                CREATE TABLE IF NOT EXISTS observations (
                    ticker TEXT NOT NULL,
                    date TEXT NOT NULL,
                    price REAL NOT NULL,
                    adjusted_price REAL NOT NULL,
                    shares_outstanding REAL,
                    market_cap REAL,
                    PRIMARY KEY (ticker, date)
                );
                CREATE INDEX IF NOT EXISTS idx_observations_date ON observations(date);",
            )
            .map_err(query_error)
    }

    pub fn insert_stocks(&self, stocks: &[Stock]) -> Result<(), WeightbenchError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for stock in stocks {
            tx.execute(
                "INSERT OR REPLACE INTO stocks (ticker, start_date, end_date, kind)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    stock.ticker,
                    stock.start_date.format(DATE_FORMAT).to_string(),
                    stock.end_date.map(|d| d.format(DATE_FORMAT).to_string()),
                    stock.kind.as_str()
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)
    }

    pub fn insert_observations<'a, I>(&self, observations: I) -> Result<usize, WeightbenchError>
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;
        let mut count = 0;

        for obs in observations {
            tx.execute(
                "INSERT OR REPLACE INTO observations
                    (ticker, date, price, adjusted_price, shares_outstanding, market_cap)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    obs.ticker,
                    obs.date.format(DATE_FORMAT).to_string(),
                    obs.price,
                    obs.adjusted_price,
                    obs.shares_outstanding,
                    obs.market_cap
                ],
            )
            .map_err(query_error)?;
            count += 1;
        }

        tx.commit().map_err(query_error)?;
        Ok(count)
    }

    /// Row counts of the stocks and observations tables.
    pub fn counts(&self) -> Result<(usize, usize), WeightbenchError> {
        let conn = self.conn()?;
        let count = |table: &str| -> Result<usize, WeightbenchError> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as usize)
            .map_err(query_error)
        };
        Ok((count("stocks")?, count("observations")?))
    }

    fn query_observation(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<Option<Observation>, WeightbenchError> {
        let last = date
            .checked_add_signed(DateDuration::days(OBSERVATION_LOOKAHEAD_DAYS))
            .unwrap_or(date);
        self.conn()?
            .query_row(
                "SELECT ticker, date, price, adjusted_price, shares_outstanding, market_cap
                 FROM observations
                 WHERE ticker = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC
                 LIMIT 1",
                params![
                    ticker,
                    date.format(DATE_FORMAT).to_string(),
                    last.format(DATE_FORMAT).to_string()
                ],
                observation_from_row,
            )
            .optional()
            .map_err(query_error)
    }
}

impl ObservationPort for SqliteAdapter {
    fn fetch_observation(&self, ticker: &str, date: NaiveDate) -> FetchOutcome {
        match self.query_observation(ticker, date) {
            Ok(Some(obs)) => FetchOutcome::Found(obs),
            Ok(None) => FetchOutcome::NotFound,
            Err(e) => FetchOutcome::FetchError(e.to_string()),
        }
    }
}

impl UniversePort for SqliteAdapter {
    fn list_stocks(&self) -> Result<Vec<Stock>, WeightbenchError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT ticker, start_date, end_date, kind FROM stocks ORDER BY ticker")
            .map_err(query_error)?;

        let rows = stmt
            .query_map([], |row| {
                let ticker: String = row.get(0)?;
                let stock = Stock::equity(&ticker, date_column(row, 1)?, optional_date_column(row, 2)?);
                Ok((stock, row.get::<_, String>(3)?))
            })
            .map_err(query_error)?;

        let mut stocks = Vec::new();
        for row in rows {
            let (mut stock, kind) = row.map_err(query_error)?;
            stock.kind = InstrumentKind::parse(&kind).ok_or_else(|| WeightbenchError::DatabaseQuery {
                reason: format!("unknown instrument kind '{kind}' for {}", stock.ticker),
            })?;
            stocks.push(stock);
        }
        Ok(stocks)
    }
}

fn observation_from_row(row: &Row<'_>) -> rusqlite::Result<Observation> {
    Ok(Observation {
        ticker: row.get(0)?,
        date: date_column(row, 1)?,
        price: row.get(2)?,
        adjusted_price: row.get(3)?,
        shares_outstanding: row.get(4)?,
        market_cap: row.get(5)?,
    })
}

fn date_column(row: &Row<'_>, index: usize) -> rusqlite::Result<NaiveDate> {
    let value: String = row.get(index)?;
    parse_date(index, &value)
}

fn optional_date_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let value: Option<String> = row.get(index)?;
    value.map(|v| parse_date(index, &v)).transpose()
}

fn parse_date(index: usize, value: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn query_error(e: rusqlite::Error) -> WeightbenchError {
    WeightbenchError::DatabaseQuery {
        reason: e.to_string(),
    }
}
