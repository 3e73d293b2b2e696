//! HTTP surface tests for market-bridge.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use bridge_common::Config;
use market_bridge::{build_router, BridgeState};

use common::{router_with, MockCn, MockGlobal};

fn test_app(cn: MockCn, global: MockGlobal) -> axum::Router {
    let router = router_with(Arc::new(cn), Arc::new(global), false);
    build_router(Arc::new(BridgeState::with_router(Config::default(), router)))
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_root_and_health() {
    let app = test_app(MockCn::new(), MockGlobal::new());

    let (status, json) = get(app.clone(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["server"], "market_bridge");

    let (status, json) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_history_camel_case_bars() {
    let app = test_app(MockCn::new(), MockGlobal::new());

    let (status, json) = get(app, "/history?symbol=SH600519&period=1y").await;

    assert_eq!(status, StatusCode::OK);
    let bars = json.as_array().unwrap();
    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0]["date"], "2024-01-02");
    assert_eq!(bars[1]["volume"], 2000.0);
}

#[tokio::test]
async fn test_history_without_symbol_is_bad_request() {
    let app = test_app(MockCn::new(), MockGlobal::new());

    let (status, json) = get(app, "/history").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["detail"].as_str().unwrap().contains("symbol"));
}

#[tokio::test]
async fn test_info_not_found_detail() {
    let app = test_app(MockCn::failing_feeds(), MockGlobal::new());

    let (status, json) = get(app, "/info/600519").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["detail"]
        .as_str()
        .unwrap()
        .starts_with("Stock info not found"));
}

#[tokio::test]
async fn test_info_profile_shape() {
    let app = test_app(MockCn::new(), MockGlobal::new());

    let (status, json) = get(app, "/info/AAPL").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["symbol"], "AAPL");
    assert_eq!(json["sector"], "N/A");
    assert_eq!(json["trailingPE"], Value::Null);
    assert_eq!(json["marketCap"], Value::Null);
}

#[tokio::test]
async fn test_news_and_events_failures_are_empty_ok() {
    let app = {
        let router = router_with(
            Arc::new(MockCn::failing_feeds()),
            Arc::new(MockGlobal::failing()),
            true,
        );
        build_router(Arc::new(BridgeState::with_router(Config::default(), router)))
    };

    for uri in ["/news", "/news?region=cn", "/events", "/events?impact=high"] {
        let (status, json) = get(app.clone(), uri).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(json, Value::Array(vec![]), "{}", uri);
    }
}

#[tokio::test]
async fn test_events_unknown_impact_is_bad_request() {
    let app = test_app(MockCn::new(), MockGlobal::new());

    let (status, json) = get(app, "/events?impact=extreme").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["detail"].is_string());
}

#[tokio::test]
async fn test_markets_region_is_case_insensitive() {
    let app = test_app(MockCn::new(), MockGlobal::failing_quotes(&["^HSI"]));

    let (status, json) = get(app, "/markets?region=Cn").await;

    assert_eq!(status, StatusCode::OK);
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 7);
    assert_eq!(items[0]["symbol"], "SH000001");
    assert_eq!(items[0]["changePercent"], 1.0);
    assert_eq!(items[0]["prevClose"], 100.0);
}

#[tokio::test]
async fn test_sectors_default_region_is_us() {
    let app = test_app(MockCn::new(), MockGlobal::new());

    let (status, json) = get(app, "/sectors").await;

    assert_eq!(status, StatusCode::OK);
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 12);
    assert_eq!(items[0]["name"], "Basic Materials");
    assert_eq!(items[0]["filterKey"], "Basic Materials");
    assert_eq!(items[0]["isUp"], true);
}

#[tokio::test]
async fn test_screener_failure_is_server_error() {
    let app = test_app(MockCn::new(), MockGlobal::failing());

    let (status, json) = get(app, "/screener?sector=energy").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["detail"].as_str().unwrap().starts_with("Screener error"));
}

#[tokio::test]
async fn test_snapshot_payload() {
    let app = test_app(MockCn::new(), MockGlobal::new());

    let (status, json) = get(app, "/snapshot").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["symbol"], "SH600519");
    assert_eq!(json[0]["changePercent"], 1.2);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = test_app(MockCn::new(), MockGlobal::new());

    let (status, _) = get(app, "/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
