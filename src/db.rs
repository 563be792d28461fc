use std::error::Error;
use std::path::Path;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Connection, Executor, PgConnection, Pool, Postgres, Sqlite, SqliteConnection};
use tracing::info;

use crate::config::{DbPostgresConfig, DbSqliteConfig};

fn postgres_connect_options(config: &DbPostgresConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(config.host.as_str())
        .port(config.port)
        .database(config.database.as_str())
        .username(config.username.as_str())
        .password(config.password.as_str())
}

fn sqlite_connect_options(config: &DbSqliteConfig) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(Path::new(config.database.as_str()))
        .create_if_missing(true)
}

pub async fn create_postgres_pool(
    config: &DbPostgresConfig,
) -> Result<Pool<Postgres>, Box<dyn Error>> {
    let schema = config.schema.clone().unwrap_or("public".to_string());
    info!(
        "DB Pool: postgresql://{}:{}/{}?currentSchema={}",
        config.host, config.port, config.database, schema
    );

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .after_connect(move |conn, _meta| {
            let s = schema.clone();
            Box::pin(async move {
                conn.execute(sqlx::query(&format!("SET SCHEMA '{}';", s)))
                    .await?;
                Ok(())
            })
        })
        .connect_with(postgres_connect_options(config))
        .await
        .map_err(|e| e.into())
}

pub async fn postgres_migrate(config: &DbPostgresConfig, path: &str) -> Result<(), Box<dyn Error>> {
    let schema = config.schema.clone().unwrap_or("public".to_string());
    info!(
        "DB migration: postgresql://{}:{}/{}?currentSchema={}, path: {}",
        config.host, config.port, config.database, schema, path
    );
    let mut conn = PgConnection::connect_with(&postgres_connect_options(config)).await?;
    conn.execute(sqlx::query(&format!(
        "CREATE SCHEMA IF NOT EXISTS {};",
        schema
    )))
    .await?;
    conn.execute(sqlx::query(&format!("SET SCHEMA '{}';", schema)))
        .await?;

    let result = conn
        .execute(sqlx::query(&format!(
            "SELECT schema_name FROM information_schema.schemata WHERE schema_name = '{}';",
            schema
        )))
        .await?;
    if result.rows_affected() == 0 {
        let _ = conn.close().await;
        return Err(format!("DB schema {} does not exist/was not created", schema).into());
    }

    let migrator = sqlx::migrate::Migrator::new(Path::new(path)).await?;
    migrator.run(&mut conn).await?;

    let _ = conn.close().await;
    Ok(())
}

pub async fn create_sqlite_pool(config: &DbSqliteConfig) -> Result<Pool<Sqlite>, Box<dyn Error>> {
    info!("DB Pool: sqlite://{}", config.database);

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(sqlite_connect_options(config))
        .await
        .map_err(|e| e.into())
}

pub async fn sqlite_migrate(config: &DbSqliteConfig, path: &str) -> Result<(), Box<dyn Error>> {
    info!("DB migration: sqlite://{}, path: {}", config.database, path);
    let mut conn = SqliteConnection::connect_with(&sqlite_connect_options(config)).await?;
    let migrator = sqlx::migrate::Migrator::new(Path::new(path)).await?;
    migrator.run(&mut conn).await?;
    let _ = conn.close().await;
    Ok(())
}
