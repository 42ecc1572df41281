use crate::core::doctor::Format;
use crate::core::ent::Status;
use crate::core::registry::Registry;
use crate::core::service::Service;

use axum::{
    error_handling::HandleErrorLayer,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tokio::time;
use tower::{BoxError, ServiceBuilder};
use tower_http::trace::TraceLayer;

#[derive(Debug, Deserialize, Default)]
pub struct Pagination {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ServiceView {
    pub name: String,
    pub url: String,
    pub family: String,
    pub status: Status,
    pub message: String,
}

impl From<&Service> for ServiceView {
    fn from(service: &Service) -> Self {
        let report = service.report();
        ServiceView {
            name: service.name().to_string(),
            url: service.url().to_string(),
            family: service.family().to_string(),
            status: report.status,
            message: report.message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FamilyView {
    pub name: String,
    pub url: String,
    pub format: Format,
    pub entities: usize,
    pub last_error: Option<String>,
    pub in_flight: bool,
}

pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/services", get(services_index))
        .route("/services/:name", get(service_show))
        .route("/families", get(families_index))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|error: BoxError| async move {
                    if error.is::<tower::timeout::error::Elapsed>() {
                        Ok(StatusCode::REQUEST_TIMEOUT)
                    } else {
                        Err((
                            StatusCode::INTERNAL_SERVER_ERROR,
                            format!("Unhandled internal error: {}", error),
                        ))
                    }
                }))
                .timeout(time::Duration::from_secs(10))
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(registry)
}

pub async fn listen(addr: SocketAddr, registry: Arc<Registry>) -> anyhow::Result<()> {
    let app = router(registry);
    tracing::debug!("listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

async fn services_index(
    pagination: Option<Query<Pagination>>,
    State(registry): State<Arc<Registry>>,
) -> impl IntoResponse {
    let Query(pagination) = pagination.unwrap_or_default();

    let services = registry
        .services()
        .iter()
        .skip(pagination.offset.unwrap_or(0))
        .take(pagination.limit.unwrap_or(usize::MAX))
        .map(|s| ServiceView::from(s.as_ref()))
        .collect::<Vec<_>>();

    Json(services)
}

async fn service_show(
    Path(name): Path<String>,
    State(registry): State<Arc<Registry>>,
) -> Result<Json<ServiceView>, StatusCode> {
    registry
        .service(&name)
        .map(|s| Json(ServiceView::from(s.as_ref())))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn families_index(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    let families = registry
        .families()
        .iter()
        .map(|c| {
            let snapshot = c.snapshot();
            FamilyView {
                name: c.name().to_string(),
                url: c.url().to_string(),
                format: c.format(),
                entities: registry.family_services(c.name()).count(),
                last_error: snapshot.last_error,
                in_flight: snapshot.in_flight,
            }
        })
        .collect::<Vec<_>>();

    Json(families)
}
