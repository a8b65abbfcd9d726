use std::ops::Deref;
use std::sync::Arc;

use tokio_postgres::{Client, NoTls};

use crate::auth::{self, Role};

/// Shared handle stored in router state. `Client` pipelines internally, so
/// one connection serves every handler.
#[derive(Clone)]
pub struct DbClient(pub Arc<Client>);

impl Deref for DbClient {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.0
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

pub async fn db_client() -> anyhow::Result<DbClient> {
    let host = env_or("PG_HOST", "localhost");
    let user = env_or("PG_USER", "ubuntu");
    let password = env_or("PG_PASSWORD", "new_password");
    let dbname = env_or("PG_DBNAME", "rental");
    let config_string = format!(
        "host={} user={} password={} dbname={}",
        host, user, password, dbname
    );
    let (client, monitor) = tokio_postgres::connect(config_string.as_str(), NoTls).await?;

    tokio::spawn(async move {
        if let Err(e) = monitor.await {
            log::error!("connection error: {}", e);
        }
    });

    Ok(DbClient(Arc::new(client)))
}

const SCHEMA: &str = "
CREATE EXTENSION IF NOT EXISTS btree_gist;

CREATE TABLE IF NOT EXISTS users (
    id            SERIAL PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL DEFAULT 'user',
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS cars (
    id            SERIAL PRIMARY KEY,
    make          TEXT NOT NULL,
    model         TEXT NOT NULL,
    year          INT NOT NULL,
    color         TEXT NOT NULL,
    price_per_day DOUBLE PRECISION NOT NULL,
    available     BOOL NOT NULL DEFAULT TRUE,
    seats         INT NOT NULL DEFAULT 5,
    fuel_type     TEXT NOT NULL DEFAULT 'petrol',
    transmission  TEXT NOT NULL DEFAULT 'automatic',
    description   TEXT NOT NULL DEFAULT '',
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS car_images (
    id         SERIAL PRIMARY KEY,
    car_id     INT NOT NULL REFERENCES cars(id) ON DELETE CASCADE,
    image_url  TEXT NOT NULL,
    is_primary BOOL NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS rentals (
    id          SERIAL PRIMARY KEY,
    reference   TEXT NOT NULL UNIQUE,
    user_id     INT NOT NULL REFERENCES users(id),
    car_id      INT NOT NULL REFERENCES cars(id),
    start_date  DATE NOT NULL,
    end_date    DATE NOT NULL,
    total_price DOUBLE PRECISION NOT NULL,
    status      TEXT NOT NULL DEFAULT 'pending',
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT rentals_no_overlap EXCLUDE USING gist (
        car_id WITH =,
        daterange(start_date, end_date, '[]') WITH &&
    ) WHERE (status <> 'cancelled')
);
";

pub async fn init_schema(db: &DbClient) -> anyhow::Result<()> {
    db.batch_execute(SCHEMA).await?;
    Ok(())
}

/// Seed the admin account on first start so car management is reachable.
pub async fn ensure_admin_user(db: &DbClient) -> anyhow::Result<()> {
    let email = env_or("ADMIN_EMAIL", "admin@myrobin.com");
    let rows = db
        .query("SELECT id FROM users WHERE email=$1", &[&email])
        .await?;
    if !rows.is_empty() {
        return Ok(());
    }
    let password = env_or("ADMIN_PASSWORD", "admin123");
    let hash = auth::hash_password(&password)?;
    db.execute(
        "INSERT INTO users (email, name, password_hash, role) VALUES ($1, $2, $3, $4)",
        &[&email, &"Admin User", &hash, &Role::Admin.as_str()],
    )
    .await?;
    log::info!("seeded admin user {}", email);
    Ok(())
}
