use std::net::SocketAddr;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::ErrorDetail, state::AppState};
use crate::{auth, listings};

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(listings::router()),
        )
        .route(
            "/",
            get(|| async { Json(json!({ "message": "AgriConnect API is running" })) }),
        )
        .route("/health", get(|| async { "ok" }))
        .layer(middleware::map_response_with_state(
            state.clone(),
            error_details,
        ))
        .with_state(state.clone())
        .layer(cors)
        // Outside the CORS layer so foreign preflights are refused too.
        .layer(middleware::from_fn_with_state(state, reject_foreign_origin))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Requests from browsers on origins outside the allow-list, preflights
/// included, never reach the CORS layer or a handler. Requests without an
/// `Origin` header pass.
async fn reject_foreign_origin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(origin) = req.headers().get(header::ORIGIN) {
        let allowed = origin
            .to_str()
            .map(|o| state.config.allowed_origins.iter().any(|a| a == o))
            .unwrap_or(false);
        if !allowed {
            tracing::warn!(origin = ?origin, "origin not allowed");
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "message": "Not allowed by CORS" })),
            )
                .into_response();
        }
    }
    next.run(req).await
}

/// Appends the internal error text to 500 bodies when the config allows it.
async fn error_details(State(state): State<AppState>, mut res: Response) -> Response {
    let Some(ErrorDetail(detail)) = res.extensions_mut().remove::<ErrorDetail>() else {
        return res;
    };
    if !state.config.expose_error_details {
        return res;
    }
    (
        res.status(),
        Json(json!({ "message": "Server error", "error": detail })),
    )
        .into_response()
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "5000".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
