//! Read API over HTTP

use std::net::SocketAddr;

use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
use linkwatch::MonitorHandle;
use tracing::info;

mod error;
mod routes;

/// Bind the read API; the caller drives and stops the returned server
pub fn bind(addr: SocketAddr, monitor: MonitorHandle) -> std::io::Result<Server> {
    let data = web::Data::new(monitor);
    let server = HttpServer::new(move || {
        App::new().app_data(data.clone()).configure(routes::routes)
    })
    .workers(1)
    .disable_signals()
    .bind(addr)?
    .run();

    info!(%addr, "HTTP read API listening");
    Ok(server)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::test;
    use linkwatch::{
        MemorySettings, Monitor, MonitorConfig, Probe, Reachability, Settings, TransportError,
    };
    use serde_json::Value;

    use super::*;

    struct AlwaysUp;

    #[async_trait::async_trait]
    impl Reachability for AlwaysUp {
        async fn reach(&self) -> Result<(), TransportError> {
            Ok(())
        }

        fn target(&self) -> &str {
            "always-up"
        }
    }

    fn monitor(online: bool) -> Monitor {
        let settings = Arc::new(MemorySettings::new(Settings::default()));
        Monitor::spawn(
            MonitorConfig::new(Probe::new(Arc::new(AlwaysUp)), settings).initially_online(online),
        )
    }

    async fn settle() {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    #[actix_web::test]
    async fn test_health_and_status() {
        let monitor = monitor(true);
        settle().await;
        let app = test::init_service(
            App::new().app_data(web::Data::new(monitor.handle())).configure(routes::routes),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/status").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "Stable");
        assert_eq!(body["online"], true);
        assert_eq!(body["schedulerState"], "Idle");
        assert_eq!(body["metrics"]["successRate"], 100.0);
        assert!(body["lastSuccessAt"].is_string());

        monitor.shutdown().await;
    }

    #[actix_web::test]
    async fn test_windowed_metrics_and_history() {
        let monitor = monitor(true);
        settle().await;
        let app = test::init_service(
            App::new().app_data(web::Data::new(monitor.handle())).configure(routes::routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/metrics?window=15m").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["window"], "15m");
        assert_eq!(body["status"], "Stable");
        assert_eq!(body["online"], true);
        assert_eq!(body["schedulerState"], "Idle");
        assert_eq!(body["metrics"]["successRate"], 100.0);

        let req = test::TestRequest::get().uri("/history?window=24h").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["success"], true);

        let req = test::TestRequest::get().uri("/metrics?window=7d").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        monitor.shutdown().await;
    }

    #[actix_web::test]
    async fn test_check_is_accepted_then_unavailable_after_shutdown() {
        let monitor = monitor(false);
        let handle = monitor.handle();
        let app = test::init_service(
            App::new().app_data(web::Data::new(handle.clone())).configure(routes::routes),
        )
        .await;

        let req = test::TestRequest::post().uri("/check").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::ACCEPTED);

        monitor.shutdown().await;
        let req = test::TestRequest::post().uri("/check").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
