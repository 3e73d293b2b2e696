//! Market Bridge - a uniform REST surface over two equity data providers.
//!
//! A-share tickers (Shanghai and Shenzhen) are served from eastmoney and
//! cls.cn; everything else goes to Yahoo Finance. Every response uses the
//! same JSON shapes whatever the source, and A-share symbols are always
//! reported in fixed form (`SH600519`).
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                    market-bridge (axum)                       │
//! ├───────────────────────────────────────────────────────────────┤
//! │  routes ──► MarketRouter ──┬──► EastmoneyAdapter (CN)          │
//! │                 │          ├──► YahooAdapter (global)          │
//! │                 │          └──► StaticCalendar (events)        │
//! │                 └──► symbol normalization + SymbolNameMap      │
//! └───────────────────────────────────────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod error;
pub mod names;
pub mod routes;
pub mod symbol;

use anyhow::Result;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use bridge_common::Config;

use crate::data::{
    CnMarketProvider, EastmoneyAdapter, EventSource, GlobalMarketProvider, MarketRouter,
    RouterConfig, StaticCalendar, YahooAdapter,
};
use crate::names::SymbolNameMap;

pub use error::BridgeError;
pub use routes::build_router;

/// Shared, read-only service state.
pub struct BridgeState {
    /// Configuration
    pub config: Config,
    /// Request router over the providers
    pub router: MarketRouter,
}

impl BridgeState {
    /// Wire the production providers from configuration.
    pub fn new(config: Config, names: SymbolNameMap) -> Self {
        let cn: Arc<dyn CnMarketProvider> =
            Arc::new(EastmoneyAdapter::new(&config.market.eastmoney));
        let global: Arc<dyn GlobalMarketProvider> =
            Arc::new(YahooAdapter::new(&config.market.yahoo));
        let events: Arc<dyn EventSource> = Arc::new(StaticCalendar::new());

        let router = MarketRouter::with_config(
            cn,
            global,
            events,
            Arc::new(names),
            RouterConfig::from(&config.market),
        );

        Self { config, router }
    }

    /// State over an already-built router.
    pub fn with_router(config: Config, router: MarketRouter) -> Self {
        Self { config, router }
    }
}

/// HTTP service
pub struct BridgeService {
    state: Arc<BridgeState>,
}

impl BridgeService {
    pub fn new(config: Config, names: SymbolNameMap) -> Self {
        Self {
            state: Arc::new(BridgeState::new(config, names)),
        }
    }

    /// Router with CORS and request tracing applied.
    pub fn app(&self) -> axum::Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        build_router(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve until the process is stopped.
    pub async fn start(self) -> Result<()> {
        let addr = self.state.config.bind_address();
        let app = self.app();

        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
