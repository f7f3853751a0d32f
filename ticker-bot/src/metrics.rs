use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use ticker_common::Symbol;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Update counters, cheap to clone (counters are shared handles)
#[derive(Clone)]
pub struct UpdateMetrics {
    registry: Registry,
    nickname_updates: IntCounter,
    activity_updates: IntCounter,
}

impl UpdateMetrics {
    pub fn new(symbol: &Symbol) -> Result<Self, prometheus::Error> {
        let nickname_updates = IntCounter::new(
            "nickname_updates",
            "Number of times discord nickname has been updated",
        )?;
        let activity_updates = IntCounter::new(
            "activity_updates",
            "Number of times discord activity has been updated",
        )?;
        let bot_symbol = IntCounter::with_opts(
            Opts::new("bot_symbol", "Exposes the symbol this bot is for")
                .const_label("symbol", symbol.as_str()),
        )?;

        let registry = Registry::new();
        registry.register(Box::new(nickname_updates.clone()))?;
        registry.register(Box::new(activity_updates.clone()))?;
        registry.register(Box::new(bot_symbol.clone()))?;
        bot_symbol.inc();

        Ok(Self {
            registry,
            nickname_updates,
            activity_updates,
        })
    }

    pub fn record_nickname_update(&self) {
        self.nickname_updates.inc();
    }

    pub fn record_activity_update(&self) {
        self.activity_updates.inc();
    }

    pub fn nickname_updates(&self) -> u64 {
        self.nickname_updates.get()
    }

    pub fn activity_updates(&self) -> u64 {
        self.activity_updates.get()
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub fn router(metrics: UpdateMetrics) -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .with_state(metrics)
}

async fn scrape(State(metrics): State<UpdateMetrics>) -> Response {
    match metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Serves `/metrics` until the listener fails
pub async fn serve(addr: SocketAddr, metrics: UpdateMetrics) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("📈 Serving metrics on http://{}/metrics", listener.local_addr()?);
    axum::serve(listener, router(metrics)).await
}
