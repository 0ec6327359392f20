use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method, Uri},
    response::{IntoResponse, Response},
    Router,
};
use crystal_types::{parse_shard_path, PathDetails};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    cache::{CachedResponse, ResponseCache},
    error::ShardError,
    registry::ShardRegistry,
    strategy::{Reply, Strategy},
    telemetry::{DataPoint, ErrorReporter, RequestTags, TelemetrySink},
};

const JSON: &str = "application/json";
const TEXT: &str = "text/plain; charset=utf-8";

pub struct AppState<S: Strategy> {
    pub registry: Arc<ShardRegistry<S>>,
    pub cache: Arc<ResponseCache>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub reporter: Arc<dyn ErrorReporter>,
}

//derive(Clone) would want S: Clone
impl<S: Strategy> Clone for AppState<S> {
    fn clone(&self) -> Self {
        AppState {
            registry: Arc::clone(&self.registry),
            cache: Arc::clone(&self.cache),
            telemetry: Arc::clone(&self.telemetry),
            reporter: Arc::clone(&self.reporter),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestParams {
    #[serde(default)]
    pub dump: Option<String>,
}

impl RequestParams {
    fn wants_dump(&self) -> bool {
        matches!(self.dump.as_deref(), Some("true") | Some("1"))
    }
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body,
        )
            .into_response()
    }
}

fn render(reply: Reply) -> CachedResponse {
    match reply {
        Reply::Json(value) => CachedResponse {
            status: axum::http::StatusCode::OK,
            content_type: JSON,
            body: value.to_string(),
        },
        Reply::Text(body) => CachedResponse {
            status: axum::http::StatusCode::OK,
            content_type: TEXT,
            body,
        },
    }
}

//no axum path matching, every path goes through parse_shard_path
pub fn router<S: Strategy>(state: AppState<S>) -> Router {
    Router::new()
        .fallback(handle_request::<S>)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_listener(listen_address: &str, app: Router) -> Result<()> {
    let addr: SocketAddr = listen_address.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_request<S: Strategy>(
    State(app): State<AppState<S>>,
    method: Method,
    uri: Uri,
    Query(params): Query<RequestParams>,
    body: String,
) -> Response {
    if uri.path() == "/favicon.ico" {
        return (axum::http::StatusCode::NOT_FOUND, "no favicon").into_response();
    }

    let details = match parse_shard_path(uri.path()) {
        Ok(details) => details,
        Err(e) => return ShardError::from(e).into_response(),
    };

    let cache_key = ResponseCache::key(method.as_str(), uri.path(), uri.query());
    let is_read = method == Method::GET && !params.wants_dump();
    if is_read {
        if let Some(hit) = app.cache.get(&cache_key) {
            return with_cache_control(hit.into_response(), &app.cache);
        }
    }

    match dispatch(&app, &method, &details, params.wants_dump(), body).await {
        Ok((response, keys)) => {
            app.telemetry
                .write_data_point(DataPoint::for_request(&details, method.as_str(), keys));
            if is_read {
                app.cache.put(cache_key, response.clone());
                with_cache_control(response.into_response(), &app.cache)
            } else {
                response.into_response()
            }
        }
        Err(e) => {
            if let ShardError::InternalFault(_) = e {
                let tags = RequestTags {
                    id: details.id.clone(),
                    address: details.address.to_string(),
                    method: method.to_string(),
                };
                app.reporter.capture(&e, &tags);
            }
            e.into_response()
        }
    }
}

async fn dispatch<S: Strategy>(
    app: &AppState<S>,
    method: &Method,
    details: &PathDetails,
    dump: bool,
    body: String,
) -> Result<(CachedResponse, usize), ShardError> {
    let allowed = matches!(*method, Method::GET | Method::PUT)
        || (*method == Method::PATCH && details.key.is_empty());
    if !allowed {
        return Err(ShardError::MethodNotAllowed);
    }
    let needs_key = *method == Method::PUT || (*method == Method::GET && !dump);
    if needs_key && details.key.is_empty() {
        return Err(ShardError::InvalidKey);
    }

    let actor = app.registry.actor(&details.address).await?;
    let reply = match *method {
        Method::GET if dump => Reply::json(&actor.dump().await)?,
        Method::GET => actor.get(&details.key).await?,
        Method::PUT => {
            let body = if body.is_empty() { None } else { Some(body) };
            actor.put(&details.key, body).await?
        }
        Method::PATCH => {
            let incoming: S::State =
                serde_json::from_str(&body).map_err(|e| ShardError::InvalidBody(e.to_string()))?;
            actor.merge_in(incoming).await?
        }
        _ => return Err(ShardError::MethodNotAllowed),
    };

    Ok((render(reply), actor.key_count().await))
}

fn with_cache_control(mut response: Response, cache: &ResponseCache) -> Response {
    if cache.is_enabled() {
        let value = format!("s-maxage={}", cache.ttl().as_secs().max(1));
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().insert(header::CACHE_CONTROL, value);
        }
    }
    response
}
