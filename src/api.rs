use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::query::LatestReading;
use crate::tenants::{Subscriptions, Tenant};

/// Shared state behind the HTTP handlers.
#[derive(Clone)]
pub struct ApiState {
    subscriptions: Arc<dyn Subscriptions>,
    latest: LatestReading,
}

impl ApiState {
    pub fn new(subscriptions: Arc<dyn Subscriptions>, latest: LatestReading) -> Self {
        Self {
            subscriptions,
            latest,
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/hello", get(hello))
        .route("/latestMeasurement", get(latest_measurement))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let app = router(state);

    let listen_addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    let listener = TcpListener::bind(listen_addr).await?;
    info!("API listening on {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct HelloParams {
    name: Option<String>,
}

async fn hello(Query(params): Query<HelloParams>) -> String {
    let name = params.name.unwrap_or_else(|| "world".to_string());
    format!("hello {}!", name)
}

#[derive(Debug, Deserialize)]
struct LatestParams {
    tenant: Option<String>,
}

/// Returns the JSON-encoded latest measurement of the selected
/// tenant's device. "Nothing reported yet" answers with the literal
/// no-value body; a registry failure answers 500 and is never masked
/// as "no value existing".
async fn latest_measurement(
    State(state): State<ApiState>,
    Query(params): Query<LatestParams>,
) -> Response {
    let tenant = match select_tenant(state.subscriptions.as_ref(), params.tenant.as_deref()) {
        Ok(tenant) => tenant,
        Err(response) => return response,
    };

    match state.latest.latest(&tenant).await {
        Ok(Some(measurement)) => Json(measurement).into_response(),
        Ok(None) => "no value existing".into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Picks the request's tenant among the active ones: the `tenant`
/// query parameter when given, the first active tenant otherwise.
/// Tenant authentication itself is the platform's concern, not ours.
fn select_tenant(subscriptions: &dyn Subscriptions, requested: Option<&str>) -> Result<Tenant, Response> {
    let tenants = subscriptions.active_tenants();

    match requested {
        Some(id) => tenants
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| (StatusCode::NOT_FOUND, format!("unknown tenant: {}", id)).into_response()),
        None => tenants
            .into_iter()
            .next()
            .ok_or_else(|| (StatusCode::NOT_FOUND, "no active tenants".to_string()).into_response()),
    }
}
