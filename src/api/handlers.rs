use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use utoipa::OpenApi;

use super::{
    dto::{MeasurementDto, SensorReadingDto},
    errors::AppError,
    AppState,
};
use crate::db::models::{Capability, ReadingValue};
use crate::readings::stats::{CapabilityStats, StatPoint};
use crate::status::{
    self, DeviceSummary, StatusLevel, SystemStatus, TimelineEntry,
};

/// Readings fed to the status/timeline derivations per request.
const DASHBOARD_WINDOW: i64 = 500;

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReadingFilterParams {
    pub capability: Option<Capability>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityParams {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub days: Option<i64>,
}

// ---------------------------------------------------------------------------
// Sensor readings
// ---------------------------------------------------------------------------

/// Fetch the latest reading for every known `(device_id, capability)` pair.
#[utoipa::path(
    get,
    path = "/sensors/latest",
    responses(
        (status = 200, description = "Latest reading per (device_id, capability)", body = Vec<SensorReadingDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn get_latest_readings(
    State(state): State<AppState>,
) -> Result<Json<Vec<SensorReadingDto>>, AppError> {
    let rows = state.readings.latest_per_device().await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Fetch readings for one device, newest first. Optionally filter by
/// capability and time range (`?capability=contact&from=<RFC3339>&to=...`).
#[utoipa::path(
    get,
    path = "/sensors/{device_id}/readings",
    params(
        ("device_id" = String, Path, description = "Device ID"),
        ("capability" = Option<Capability>, Query, description = "Capability filter"),
        ("from" = Option<DateTime<Utc>>, Query, description = "Start of time range (RFC3339)"),
        ("to"   = Option<DateTime<Utc>>, Query, description = "End of time range (RFC3339)"),
        ("limit" = Option<i64>, Query, description = "Maximum rows (default 100)"),
    ),
    responses(
        (status = 200, description = "Readings, newest first", body = Vec<SensorReadingDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn get_device_readings(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(params): Query<ReadingFilterParams>,
) -> Result<Json<Vec<SensorReadingDto>>, AppError> {
    let rows = state
        .readings
        .device_readings(
            &device_id,
            params.capability,
            params.from,
            params.to,
            params.limit.unwrap_or(100),
        )
        .await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Fetch all readings in a time range, oldest first.
#[utoipa::path(
    get,
    path = "/readings",
    params(
        ("from" = Option<DateTime<Utc>>, Query, description = "Start of time range (RFC3339)"),
        ("to"   = Option<DateTime<Utc>>, Query, description = "End of time range (RFC3339)"),
        ("limit" = Option<i64>, Query, description = "Maximum rows (default 50000)"),
    ),
    responses(
        (status = 200, description = "Readings, oldest first", body = Vec<SensorReadingDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn get_readings(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<SensorReadingDto>>, AppError> {
    let rows = state
        .readings
        .range_readings(params.from, params.to, params.limit.unwrap_or(50_000))
        .await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Activation events in a time range: every `true` for level-triggered
/// capabilities, only open-transitions for door sensors.
#[utoipa::path(
    get,
    path = "/activity",
    params(
        ("from" = DateTime<Utc>, Query, description = "Start of time range (RFC3339, inclusive)"),
        ("to"   = DateTime<Utc>, Query, description = "End of time range (RFC3339, inclusive)"),
    ),
    responses(
        (status = 200, description = "Activation events, oldest first", body = Vec<SensorReadingDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn get_activity(
    State(state): State<AppState>,
    Query(params): Query<ActivityParams>,
) -> Result<Json<Vec<SensorReadingDto>>, AppError> {
    let rows = state.readings.scan(params.from, params.to).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Count/min/max/avg for one device+capability over a trailing window.
#[utoipa::path(
    get,
    path = "/sensors/{device_id}/{capability}/stats",
    params(
        ("device_id" = String, Path, description = "Device ID"),
        ("capability" = Capability, Path, description = "Capability"),
        ("days" = Option<i64>, Query, description = "Window size in days (default 7)"),
    ),
    responses(
        (status = 200, description = "Window aggregate", body = CapabilityStats),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn get_capability_stats(
    State(state): State<AppState>,
    Path((device_id, capability)): Path<(String, Capability)>,
    Query(params): Query<StatsParams>,
) -> Result<Json<CapabilityStats>, AppError> {
    let stats = state
        .readings
        .capability_stats(&device_id, capability, params.days.unwrap_or(7), Utc::now())
        .await?;
    Ok(Json(stats))
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Coarse system status derived from the most recent readings.
#[utoipa::path(
    get,
    path = "/dashboard/status",
    responses(
        (status = 200, description = "System status", body = SystemStatus),
        (status = 500, description = "Internal server error"),
    ),
    tag = "dashboard"
)]
pub async fn get_dashboard_status(
    State(state): State<AppState>,
) -> Result<Json<SystemStatus>, AppError> {
    let readings = state.readings.recent_readings(DASHBOARD_WINDOW).await?;
    let device_count = state.cache.device_count().await;
    Ok(Json(status::system_status(
        &readings,
        device_count,
        Utc::now(),
    )))
}

/// Today's activity timeline (local calendar day), most recent first.
#[utoipa::path(
    get,
    path = "/dashboard/timeline",
    responses(
        (status = 200, description = "Timeline entries", body = Vec<TimelineEntry>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "dashboard"
)]
pub async fn get_dashboard_timeline(
    State(state): State<AppState>,
) -> Result<Json<Vec<TimelineEntry>>, AppError> {
    let readings = state.readings.recent_readings(DASHBOARD_WINDOW).await?;
    Ok(Json(status::today_timeline(&readings, Local::now())))
}

/// One summary per device seen in the recent readings window.
#[utoipa::path(
    get,
    path = "/dashboard/devices",
    responses(
        (status = 200, description = "Device summaries", body = Vec<DeviceSummary>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "dashboard"
)]
pub async fn get_dashboard_devices(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeviceSummary>>, AppError> {
    let readings = state.readings.recent_readings(DASHBOARD_WINDOW).await?;
    Ok(Json(status::device_summaries(&readings, Utc::now())))
}

// ---------------------------------------------------------------------------
// Measurements
// ---------------------------------------------------------------------------

/// Raw measurements for one logical item, newest first.
#[utoipa::path(
    get,
    path = "/measurements/{item_id}",
    params(
        ("item_id" = String, Path, description = "Logical item ID"),
        ("capability" = Option<Capability>, Query, description = "Capability filter"),
        ("from" = Option<DateTime<Utc>>, Query, description = "Start of time range (RFC3339)"),
        ("to"   = Option<DateTime<Utc>>, Query, description = "End of time range (RFC3339)"),
        ("limit" = Option<i64>, Query, description = "Maximum rows (default 1000)"),
    ),
    responses(
        (status = 200, description = "Measurements, newest first", body = Vec<MeasurementDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "measurements"
)]
pub async fn get_measurements(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Query(params): Query<ReadingFilterParams>,
) -> Result<Json<Vec<MeasurementDto>>, AppError> {
    let rows = state
        .measurements
        .measurements(
            &item_id,
            params.capability,
            params.from,
            params.to,
            params.limit.unwrap_or(1000),
        )
        .await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// The single latest measurement for one item+capability.
#[utoipa::path(
    get,
    path = "/measurements/{item_id}/{capability}/latest",
    params(
        ("item_id" = String, Path, description = "Logical item ID"),
        ("capability" = Capability, Path, description = "Capability"),
    ),
    responses(
        (status = 200, description = "Latest measurement, or null", body = MeasurementDto),
        (status = 500, description = "Internal server error"),
    ),
    tag = "measurements"
)]
pub async fn get_latest_measurement(
    State(state): State<AppState>,
    Path((item_id, capability)): Path<(String, Capability)>,
) -> Result<Json<Option<MeasurementDto>>, AppError> {
    let row = state.measurements.latest(&item_id, capability).await?;
    Ok(Json(row.map(Into::into)))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        get_latest_readings,
        get_device_readings,
        get_readings,
        get_activity,
        get_capability_stats,
        get_dashboard_status,
        get_dashboard_timeline,
        get_dashboard_devices,
        get_measurements,
        get_latest_measurement,
        health,
    ),
    components(schemas(
        SensorReadingDto,
        MeasurementDto,
        Capability,
        ReadingValue,
        CapabilityStats,
        StatPoint,
        SystemStatus,
        StatusLevel,
        TimelineEntry,
        DeviceSummary,
    )),
    tags(
        (name = "sensors", description = "Sensor reading endpoints"),
        (name = "measurements", description = "Raw measurement endpoints"),
        (name = "dashboard", description = "Derived dashboard views"),
        (name = "system", description = "System endpoints"),
    ),
    info(
        title = "Home Monitor API",
        version = "0.1.0",
        description = "REST API for home sensor telemetry and derived activity views"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;

    use crate::api::{router, AppState};
    use crate::measurements::MeasurementRepo;
    use crate::reading_cache::ReadingCache;
    use crate::readings::ReadingRepo;

    /// State over a lazy pool — no connection is made until a query runs,
    /// which the routes under test never do.
    fn test_state() -> AppState {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/home_monitor_test")
            .expect("lazy pool from static url");
        AppState {
            readings: ReadingRepo::new(pool.clone()),
            measurements: MeasurementRepo::new(pool),
            cache: ReadingCache::new(),
        }
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let server = TestServer::new(router(test_state())).unwrap();
        let resp = server.get("/health").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn openapi_spec_is_served() {
        let server = TestServer::new(router(test_state())).unwrap();
        let resp = server.get("/api-docs/openapi.json").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["info"]["title"], "Home Monitor API");
        assert!(body["paths"]["/activity"].is_object());
        assert!(body["paths"]["/dashboard/status"].is_object());
    }
}
