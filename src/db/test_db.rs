//! Throwaway PostgreSQL databases for store tests.
//!
//! One server is shared by every test: `TEST_DATABASE_URL` when set (it must
//! point at a database the user may run `CREATE DATABASE` from), otherwise a
//! container started on first use. Each [`TestDb`] is a fresh database with
//! the migrations applied.

use sqlx::{Connection, PgConnection, PgPool};
use testcontainers_modules::{
    postgres::Postgres,
    testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt},
};
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::postgres::PgStore;
use super::run_migrations;

struct Server {
    /// Held so the container lives as long as the test binary
    _container: Option<ContainerAsync<Postgres>>,
    /// Connection string without the database name
    base_url: String,
}

static SERVER: OnceCell<Server> = OnceCell::const_new();

async fn start_server() -> Server {
    if let Ok(url) = std::env::var("TEST_DATABASE_URL") {
        let base_url = match url.rsplit_once('/') {
            Some((base, _db)) => base.to_string(),
            None => url,
        };
        return Server {
            _container: None,
            base_url,
        };
    }

    // gen_random_uuid() needs PostgreSQL 13 or newer
    let container = Postgres::default()
        .with_tag("16-alpine")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");
    let host = container
        .get_host()
        .await
        .expect("Failed to get container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get container port");

    Server {
        base_url: format!("postgresql://postgres:postgres@{}:{}", host, port),
        _container: Some(container),
    }
}

pub(crate) struct TestDb {
    pub pool: PgPool,
    pub name: String,
}

impl TestDb {
    pub async fn new() -> Self {
        let server = SERVER.get_or_init(start_server).await;
        let name = format!("promo_test_{}", Uuid::new_v4().simple());

        let mut admin = PgConnection::connect(&format!("{}/postgres", server.base_url))
            .await
            .expect("Failed to connect to postgres database");
        sqlx::query(&format!("CREATE DATABASE \"{}\"", name))
            .execute(&mut admin)
            .await
            .expect("Failed to create test database");
        admin.close().await.expect("Failed to close admin connection");

        let pool = PgPool::connect(&format!("{}/{}", server.base_url, name))
            .await
            .expect("Failed to create pool for test database");
        run_migrations(&pool)
            .await
            .expect("Failed to run migrations on test database");

        Self { pool, name }
    }

    pub fn store(&self) -> PgStore {
        PgStore::new(self.pool.clone())
    }

    /// Drop the database; a test that panics first leaves it behind.
    pub async fn cleanup(self) {
        self.pool.close().await;
        let Some(server) = SERVER.get() else {
            return;
        };
        if let Ok(mut admin) =
            PgConnection::connect(&format!("{}/postgres", server.base_url)).await
        {
            let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{}\"", self.name))
                .execute(&mut admin)
                .await;
            let _ = admin.close().await;
        }
    }
}
