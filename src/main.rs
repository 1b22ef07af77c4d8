//! Alert relay — binary entrypoint.
//! Boots the Axum HTTP server on Shuttle with routes, shared state, and middleware.

use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    alert_relay::logging::init_tracing();

    let router = alert_relay::app().await?;
    Ok(router.into())
}
