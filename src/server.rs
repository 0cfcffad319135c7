use crate::domain::Coordinate;
use crate::error::{LocatorError, Result};
use crate::projector::project;
use crate::proximity::{CandidateFilters, ProximityEngine, ProximityQuery};
use axum::{
    extract::Query,
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Extension, Router,
};
use hyper::Server;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub struct AppState {
    pub engine: Arc<ProximityEngine>,
    pub default_radius_km: f64,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "medfinder",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "success": false, "message": message })),
    )
        .into_response()
}

fn parse_f64(params: &HashMap<String, String>, key: &str) -> Option<f64> {
    params.get(key).and_then(|raw| raw.trim().parse().ok())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// `GET /doctors/nearby?latitude=..&longitude=..&radius_km=..` with optional
/// `available`, `speciality` and `q` filters. The one and only nearby code
/// path: everything goes through the proximity engine.
///
/// Query parameters arrive as strings (as they did for the original map
/// clients), so they are parsed here and rejected with a structured body
/// rather than an extractor error.
async fn nearby(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(latitude) = parse_f64(&params, "latitude") else {
        return bad_request("latitude and longitude are required numbers");
    };
    let Some(longitude) = parse_f64(&params, "longitude") else {
        return bad_request("latitude and longitude are required numbers");
    };
    let Some(origin) = Coordinate::new(latitude, longitude) else {
        return bad_request("latitude must be in [-90, 90] and longitude in [-180, 180]");
    };

    let radius_km = match params.get("radius_km") {
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(radius) if radius.is_finite() && radius > 0.0 => radius,
            _ => return bad_request("radius_km must be a positive number"),
        },
        None => state.default_radius_km,
    };

    let available = match params.get("available") {
        Some(raw) => match parse_bool(raw) {
            Some(flag) => Some(flag),
            None => return bad_request("available must be true or false"),
        },
        None => None,
    };

    let query = ProximityQuery {
        origin,
        radius_km,
        filters: CandidateFilters {
            available,
            speciality: params.get("speciality").cloned(),
            text: params.get("q").cloned(),
        },
    };

    match state.engine.find_within(&query).await {
        Ok(matches) => Json(serde_json::json!({
            "success": true,
            "doctors": project(matches),
        }))
        .into_response(),
        Err(LocatorError::Validation(message)) => bad_request(&message),
        Err(e) => {
            error!(error = %e, "nearby query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "success": false, "message": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/doctors/nearby", get(nearby))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: Arc<AppState>, port: u16) -> Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "HTTP server listening");
    Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|e| LocatorError::Server(e.to_string()))?;

    Ok(())
}
