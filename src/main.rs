use anyhow::Result;
use flip_scout::api::ReqwestTransport;
use flip_scout::core::logging::init_logging;
use flip_scout::core::{Config, HealthChecker};
use flip_scout::market::{Aggregator, ConditionCode, ListingQuery};
use flip_scout::ScoutError;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::Filter;

struct AppState {
    aggregator: Aggregator,
    health: HealthChecker,
    timeout: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config.server.log_level);

    tracing::info!("🚀 Flip Scout starting...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Sandbox mode: {}", config.marketplace.sandbox_mode);

    if config.marketplace.client_id.is_none() || config.marketplace.client_secret.is_none() {
        tracing::warn!("⚠️  EBAY_CLIENT_ID / EBAY_CLIENT_SECRET not set, lookups will fail");
    }

    let transport = Arc::new(ReqwestTransport::new(&config.marketplace.user_agent)?);
    let aggregator = Aggregator::new(
        transport,
        config.marketplace.endpoints(),
        config.marketplace.credentials(),
        config.search.clone(),
    );

    let state = Arc::new(AppState {
        aggregator,
        health: HealthChecker::new(),
        timeout: Duration::from_secs(config.server.request_timeout_secs),
    });

    let port = config.server.port;
    tracing::info!("✅ Listening on port {}", port);

    warp::serve(routes(state)).run(([0, 0, 0, 0], port)).await;

    Ok(())
}

fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let with_state = warp::any().map(move || state.clone());

    let market = warp::path!("api" / "market")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state.clone())
        .and_then(market_lookup);

    let search = warp::path!("api" / "search")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state.clone())
        .and_then(keyword_search);

    let health = warp::path("health")
        .and(warp::get())
        .and(with_state)
        .and_then(|state: Arc<AppState>| async move {
            let status = state.health.get_status().await;
            Ok::<_, warp::Rejection>(warp::reply::json(&status))
        });

    market
        .or(search)
        .or(health)
        .with(warp::trace::request())
}

async fn market_lookup(
    params: HashMap<String, String>,
    state: Arc<AppState>,
) -> Result<WithStatus<Json>, warp::Rejection> {
    let Some(barcode) = param(&params, "barcode") else {
        return Ok(error_reply(StatusCode::BAD_REQUEST, "invalid_request", "Barcode is required"));
    };

    let conditions = match param(&params, "condition") {
        Some(text) => match ConditionCode::parse_list(text) {
            Ok(conditions) => conditions,
            Err(e) => return Ok(error_reply(StatusCode::BAD_REQUEST, "invalid_request", &e)),
        },
        None => BTreeSet::new(),
    };

    let query = ListingQuery::new(barcode).with_conditions(conditions);
    let Ok(outcome) = tokio::time::timeout(state.timeout, state.aggregator.aggregate(&query)).await
    else {
        state.health.record_timeout().await;
        return Ok(timeout_reply(&query));
    };

    state.health.record_outcome(&outcome).await;
    Ok(match outcome {
        Ok(snapshot) => success_reply(&snapshot),
        Err(e) => scout_error_reply(&e),
    })
}

async fn keyword_search(
    params: HashMap<String, String>,
    state: Arc<AppState>,
) -> Result<WithStatus<Json>, warp::Rejection> {
    let Some(keywords) = param(&params, "q") else {
        return Ok(error_reply(StatusCode::BAD_REQUEST, "invalid_request", "Search text is required"));
    };

    let query = ListingQuery::new(keywords);
    let Ok(outcome) =
        tokio::time::timeout(state.timeout, state.aggregator.search_keywords(&query)).await
    else {
        state.health.record_timeout().await;
        return Ok(timeout_reply(&query));
    };

    state.health.record_outcome(&outcome).await;
    Ok(match outcome {
        Ok(listings) => success_reply(&listings),
        Err(e) => scout_error_reply(&e),
    })
}

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn success_reply<T: Serialize>(body: &T) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(body), StatusCode::OK)
}

fn error_reply(status: StatusCode, kind: &str, message: &str) -> WithStatus<Json> {
    warp::reply::with_status(
        warp::reply::json(&json!({ "error": message, "kind": kind })),
        status,
    )
}

fn scout_error_reply(err: &ScoutError) -> WithStatus<Json> {
    tracing::error!("❌ Lookup failed ({}): {}", err.kind(), err);
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::BAD_GATEWAY);
    error_reply(status, err.kind(), &err.client_message())
}

// The lookup future is already dropped by now, so its in-flight requests are gone.
fn timeout_reply(query: &ListingQuery) -> WithStatus<Json> {
    tracing::warn!("⏱️  Lookup for '{}' timed out", query.identifier);
    error_reply(
        StatusCode::GATEWAY_TIMEOUT,
        "timeout",
        "Marketplace lookup timed out",
    )
}
