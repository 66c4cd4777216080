//! Storage handle. Queries and data modeling live in the persistence layer
//! (out of scope here); the lifecycle only needs a handle it can hold open
//! while serving and disconnect on the way down.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use paceline_lifecycle::shutdown::Storage;

/// Postgres pool wrapper. Connections are established lazily so constructing
/// the handle never blocks boot on the database.
#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn connect_lazy(url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(url)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

impl Storage for Database {
    /// Close the pool and settle once checked-out connections are returned.
    async fn disconnect(self) -> anyhow::Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paceline_lifecycle::shutdown::Storage as _;

    #[tokio::test]
    async fn disconnect_settles_and_closes_clones() {
        let db = Database::connect_lazy("postgres://paceline@localhost/paceline_test").unwrap();
        let observer = db.clone();
        assert!(!observer.is_closed());

        db.disconnect().await.unwrap();
        assert!(observer.is_closed());
    }

    #[test]
    fn invalid_url_is_rejected_up_front() {
        assert!(Database::connect_lazy("not-a-database-url").is_err());
    }
}
