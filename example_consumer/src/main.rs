//! Example consumer: a separate Rust project that uses crudkit as a
//! dependency. Defines two record types, recreates their tables, seeds a
//! user with a linked session, and serves CRUD endpoints for both.
//!
//! Run from repo root: `cargo run -p example-consumer`

use crudkit::{record_routes, AppState, Controller, Record};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Record, Serialize, Deserialize, Default)]
struct User {
    id: i64,
    flags: i64,
    #[crud("req email")]
    email: String,
    created_at: i64,
}

#[derive(Record, Serialize, Deserialize, Default)]
struct Session {
    id: i64,
    flags: i64,
    #[crud("req lenmin:3 lenmax:255")]
    key: String,
    expires_at: i64,
    #[crud("req link:user")]
    user_id: i64,
    #[serde(skip)]
    user: Option<User>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crudkit=debug")),
        )
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/crudkit".into());
    let table_prefix = std::env::var("TABLE_PREFIX").unwrap_or_else(|_| "app1_".into());
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let controller = Controller::new(pool, table_prefix);

    // Recreate the demo tables on every start.
    controller.drop_table::<Session>().await?;
    controller.drop_table::<User>().await?;
    controller.create_table::<User>().await?;
    controller.create_table::<Session>().await?;

    let mut admin = User {
        flags: 1 + 2 + 4,
        email: "admin@example.com".into(),
        created_at: 1,
        ..User::default()
    };
    controller.save(&mut admin).await?;
    tracing::info!(id = admin.id, "seeded admin user");

    let mut session = Session {
        flags: 1,
        key: "bootstrap-session-key".into(),
        expires_at: 2,
        user: Some(admin),
        ..Session::default()
    };
    controller.save(&mut session).await?;
    tracing::info!(id = session.id, user_id = session.user_id, "seeded session");

    let state = AppState {
        controller: Arc::new(controller),
    };
    let app = axum::Router::new()
        .nest("/v1/users", record_routes::<User>(state.clone()))
        .nest("/v1/sessions", record_routes::<Session>(state.clone()));

    let listen_addr =
        std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&listen_addr).await?;
    tracing::info!("example consumer listening on http://{}", listen_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
