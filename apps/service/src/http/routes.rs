use actix_web::{HttpResponse, Responder, get, post, web};
use chrono::{DateTime, SecondsFormat};
use linkwatch::{DerivedMetrics, MonitorHandle, Report, SchedulerState, StabilityStatus, TimeWindow};
use serde::{Deserialize, Serialize};

use super::error::AppError;

macros_utils::routes! {
    route health_route,
    route status_route,
    route metrics_route,
    route history_route,
    route check_route,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    window: Option<String>,
}

impl WindowQuery {
    fn parse(&self) -> Result<Option<TimeWindow>, AppError> {
        self.window
            .as_deref()
            .map(|raw| raw.parse::<TimeWindow>().map_err(AppError::InvalidWindow))
            .transpose()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    status: StabilityStatus,
    online: bool,
    scheduler_state: SchedulerState,
    retry_count: u32,
    /// RFC 3339 rendering of `metrics.lastSuccessTimestamp`
    last_success_at: Option<String>,
    metrics: DerivedMetrics,
}

/// Health check route
/// This route returns no content, the response status is enough.
#[get("/")]
pub async fn health_route() -> impl Responder {
    HttpResponse::Ok()
}

/// Status and metrics over the whole history
#[get("/status")]
pub async fn status_route(monitor: web::Data<MonitorHandle>) -> impl Responder {
    let report = monitor.report(None);
    let last_success_at = report
        .metrics
        .last_success_timestamp
        .and_then(DateTime::from_timestamp_millis)
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true));

    web::Json(StatusResponse {
        status: report.status,
        online: report.online,
        scheduler_state: report.scheduler_state,
        retry_count: report.retry_count,
        last_success_at,
        metrics: report.metrics,
    })
}

#[get("/metrics")]
pub async fn metrics_route(
    monitor: web::Data<MonitorHandle>,
    query: web::Query<WindowQuery>,
) -> Result<web::Json<Report>, AppError> {
    let window = query.parse()?;
    Ok(web::Json(monitor.report(window)))
}

/// Measurements, oldest first
#[get("/history")]
pub async fn history_route(
    monitor: web::Data<MonitorHandle>,
    query: web::Query<WindowQuery>,
) -> Result<impl Responder, AppError> {
    let window = query.parse()?;
    Ok(web::Json(monitor.history(window)))
}

/// Ask for a check now; dropped by the engine while one is running
#[post("/check")]
pub async fn check_route(monitor: web::Data<MonitorHandle>) -> Result<impl Responder, AppError> {
    monitor.check_now()?;
    Ok(HttpResponse::Accepted().finish())
}
