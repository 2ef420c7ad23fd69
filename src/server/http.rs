//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling, one task per connection.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::Args;
use crate::routes;
use crate::services::{spawn_reconcile_task, AccomplishService, ReconcileService, TotalsService};
use crate::store::Stores;
use crate::types::{BoardError, Result};

/// Upper bound on request bodies; every accepted payload is a few ids
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub stores: Stores,
    pub accomplish: AccomplishService,
    pub totals: TotalsService,
    pub reconcile: ReconcileService,
    /// Mission ids parsed once from MISSION_IDS
    pub mission_catalog: Vec<String>,
    pub started_at: Instant,
}

impl AppState {
    /// Wire services onto the given storage handles
    pub fn new(args: Args, stores: Stores) -> Self {
        let mission_catalog = args.mission_catalog();
        Self {
            accomplish: AccomplishService::new(&stores),
            totals: TotalsService::new(&stores),
            reconcile: ReconcileService::new(&stores),
            mission_catalog,
            started_at: Instant::now(),
            args,
            stores,
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Missionboard listening on {} as node {} (store: {})",
        state.args.listen,
        state.args.node_id,
        state.stores.backend_name()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled");
    }

    if let Some(secs) = state.args.reconcile_interval_secs {
        spawn_reconcile_task(state.reconcile.clone(), Duration::from_secs(secs));
        info!("Counter reconcile enabled every {}s", secs);
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        debug!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let admin_key = req
        .headers()
        .get(routes::ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let response = match (method, route_path(&path)) {
        (Method::OPTIONS, _) => preflight_response(),

        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(&state).await
        }

        (Method::GET, "/week") => routes::current_week(&state),

        (Method::POST, "/accomplish") => match read_body(req.into_body()).await {
            Ok(body) => routes::handle_claim(&state, body).await,
            Err(e) => routes::error_response(&e),
        },

        (Method::DELETE, "/accomplish") => match read_body(req.into_body()).await {
            Ok(body) => routes::handle_retract(&state, body).await,
            Err(e) => routes::error_response(&e),
        },

        (Method::POST, "/mission-totals") => match read_body(req.into_body()).await {
            Ok(body) => routes::handle_mission_totals(&state, body).await,
            Err(e) => routes::error_response(&e),
        },

        (Method::POST, "/admin/reconcile") => match read_body(req.into_body()).await {
            Ok(body) => routes::handle_reconcile(&state, admin_key.as_deref(), body).await,
            Err(e) => routes::error_response(&e),
        },

        _ => not_found_response(&path),
    };

    Ok(response)
}

/// Routes are served both at the root and under `/api`
fn route_path(path: &str) -> &str {
    match path.strip_prefix("/api") {
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

/// Collect a request body, bounded by MAX_BODY_BYTES
async fn read_body<B>(body: B) -> Result<Bytes>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                BoardError::PayloadTooLarge(format!(
                    "Request body exceeds {} bytes",
                    MAX_BODY_BYTES
                ))
            } else {
                BoardError::InvalidArgument(format!("Failed to read request body: {}", e))
            }
        })
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
    );
    response
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    routes::json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({
            "ok": false,
            "error": format!("Not found: {}", path),
        }),
    )
}
