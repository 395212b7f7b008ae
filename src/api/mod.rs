pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{routing::get, Router};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::measurements::MeasurementRepo;
use crate::reading_cache::ReadingCache;
use crate::readings::ReadingRepo;

use handlers::ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub readings: ReadingRepo,
    pub measurements: MeasurementRepo,
    pub cache: ReadingCache,
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/sensors/latest", get(handlers::get_latest_readings))
        .route(
            "/sensors/{device_id}/readings",
            get(handlers::get_device_readings),
        )
        .route(
            "/sensors/{device_id}/{capability}/stats",
            get(handlers::get_capability_stats),
        )
        .route("/readings", get(handlers::get_readings))
        .route("/activity", get(handlers::get_activity))
        .route("/dashboard/status", get(handlers::get_dashboard_status))
        .route("/dashboard/timeline", get(handlers::get_dashboard_timeline))
        .route("/dashboard/devices", get(handlers::get_dashboard_devices))
        .route("/measurements/{item_id}", get(handlers::get_measurements))
        .route(
            "/measurements/{item_id}/{capability}/latest",
            get(handlers::get_latest_measurement),
        )
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
