//! Data Access Layer
//!
//! Listings are the only records kept in PostgreSQL. Queries are built at
//! runtime with `sqlx::QueryBuilder` because the filters are optional.

use anyhow::Result;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use tutor_core::listing::Listing;

use crate::models::{ListingRow, ListingsParams};

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Fetches listings matching the equality filters, newest first.
    ///
    /// Text search is not done here; see `tutor_core::listing::search_listings`.
    pub async fn list_listings(&self, params: &ListingsParams) -> Result<Vec<Listing>> {
        let mut query = listings_query(params);
        debug!(sql = query.sql(), "Fetching listings");
        let rows = query
            .build_query_as::<ListingRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Listing::try_from).collect()
    }
}

fn listings_query(params: &ListingsParams) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(
        "SELECT id, kind, title, description, category, location, remote, pay_min, pay_max, created_at \
         FROM listings WHERE TRUE",
    );
    if let Some(kind) = params.kind {
        query.push(" AND kind = ").push_bind(kind.to_string());
    }
    if let Some(category) = params.category.as_deref().filter(|c| !c.trim().is_empty()) {
        query
            .push(" AND lower(category) = lower(")
            .push_bind(category.trim().to_string())
            .push(")");
    }
    if params.remote_only {
        query.push(" AND remote");
    }
    query
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(params.effective_limit());
    query
}
