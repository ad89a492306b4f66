//! PostgreSQL-backed rate store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use snapworth_common::Currency;
use snapworth_fx::{CachedRate, RateStore, StoreError};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

const MAX_CONNECTIONS: u32 = 10;

/// Rate cache rows keyed by ordered `(from_currency, to_currency)`.
#[derive(Debug, Clone)]
pub struct PgRateStore {
    pool: PgPool,
}

impl PgRateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Create the rates table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS currency_rates (
                from_currency CHAR(3) NOT NULL,
                to_currency CHAR(3) NOT NULL,
                rate NUMERIC NOT NULL,
                last_updated TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (from_currency, to_currency)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Rate table ready");
        Ok(())
    }
}

fn store_error(e: impl std::fmt::Display) -> StoreError {
    StoreError(e.to_string())
}

#[async_trait]
impl RateStore for PgRateStore {
    async fn get(&self, from: &Currency, to: &Currency) -> Result<Option<CachedRate>, StoreError> {
        let row: Option<(String, String, Decimal, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT from_currency, to_currency, rate, last_updated
            FROM currency_rates
            WHERE from_currency = $1 AND to_currency = $2
            "#,
        )
        .bind(from.code())
        .bind(to.code())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(|(from, to, rate, last_updated)| -> Result<CachedRate, StoreError> {
            Ok(CachedRate::at(
                Currency::parse(from.trim()).map_err(store_error)?,
                Currency::parse(to.trim()).map_err(store_error)?,
                rate,
                last_updated,
            ))
        })
        .transpose()
    }

    async fn upsert(&self, rate: CachedRate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO currency_rates (from_currency, to_currency, rate, last_updated)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (from_currency, to_currency) DO UPDATE SET
                rate = EXCLUDED.rate,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(rate.from.code())
        .bind(rate.to.code())
        .bind(rate.rate)
        .bind(rate.last_updated)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }
}
