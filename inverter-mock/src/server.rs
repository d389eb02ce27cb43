//! HTTP query service
//!
//! Serves the telemetry snapshot at `GET /vehicle_data` on a background
//! thread. The listener is bound up front so that a port already in use is
//! reported to the caller instead of dying inside the server thread.

use crate::store::TelemetryStore;
use crate::types::{MockError, Result};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    body::Incoming,
    header::{
        HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
        ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
        ACCESS_CONTROL_REQUEST_HEADERS, ALLOW, CONTENT_TYPE, ORIGIN, VARY,
    },
    http::{Method, Request, Response, StatusCode},
    service::service_fn,
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder as HyperServerBuilder,
};
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::net::TcpListener;

/// Path of the only route
pub const VEHICLE_DATA_PATH: &str = "/vehicle_data";

/// Port the dashboard expects the mock on
pub const DEFAULT_PORT: u16 = 8000;

/// Default bind address: all interfaces on [`DEFAULT_PORT`]
pub const DEFAULT_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT);

const PREFLIGHT_METHODS: &str = "DELETE, GET, HEAD, OPTIONS, PATCH, POST, PUT";
const PREFLIGHT_MAX_AGE: &str = "600";

/// A bound, not yet running, HTTP query service
#[derive(Debug)]
pub struct TelemetryServer {
    listener: std::net::TcpListener,
    store: TelemetryStore,
}

impl TelemetryServer {
    /// Bind the listener on `addr`
    ///
    /// Fails with [`MockError::Bind`] if the port cannot be acquired.
    pub fn bind(addr: SocketAddr, store: TelemetryStore) -> Result<Self> {
        let listener =
            std::net::TcpListener::bind(addr).map_err(|source| MockError::Bind { addr, source })?;
        listener.set_nonblocking(true)?;

        log::debug!("HTTP listener bound on {}", addr);
        Ok(Self { listener, store })
    }

    /// Address the listener is bound to (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the service on a dedicated thread with its own runtime
    ///
    /// The thread lives until the process exits.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(MockError::Runtime)?;

        let handle = std::thread::Builder::new()
            .name("vehicle-data-http".to_string())
            .spawn(move || {
                if let Err(e) = runtime.block_on(self.serve()) {
                    log::error!("HTTP query service stopped: {}", e);
                }
            })
            .map_err(MockError::Runtime)?;

        Ok(handle)
    }

    /// Accept connections forever, answering each on its own task
    pub async fn serve(self) -> Result<()> {
        let addr = self.local_addr()?;
        let listener = TcpListener::from_std(self.listener)?;

        log::info!(
            "Vehicle data available at http://{}{}",
            addr,
            VEHICLE_DATA_PATH
        );

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    log::warn!("Failed to accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };
            log::trace!("Accepted connection from {}", peer);

            let io = TokioIo::new(stream);
            let store = self.store.clone();
            let service = service_fn(move |req: Request<Incoming>| {
                let response = handle_request(&req, &store);
                async move { Ok::<_, Infallible>(response) }
            });

            tokio::spawn(async move {
                if let Err(err) = HyperServerBuilder::new(TokioExecutor::new())
                    .serve_connection(io, service)
                    .await
                {
                    log::error!("HTTP connection error from {}: {}", peer, err);
                }
            });
        }
    }
}

/// Answer a single request against the store
///
/// Every response carries permissive CORS headers.
pub fn handle_request<B>(req: &Request<B>, store: &TelemetryStore) -> Response<Full<Bytes>> {
    log::debug!("{} {}", req.method(), req.uri().path());

    let mut response = match (req.method(), req.uri().path()) {
        (&Method::OPTIONS, _) => preflight_response(req.headers()),
        (&Method::GET, VEHICLE_DATA_PATH) => vehicle_data_response(store),
        (_, VEHICLE_DATA_PATH) => {
            let mut response = json_response(
                StatusCode::METHOD_NOT_ALLOWED,
                Bytes::from_static(br#"{"detail":"Method Not Allowed"}"#),
            );
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET"));
            response
        }
        _ => json_response(
            StatusCode::NOT_FOUND,
            Bytes::from_static(br#"{"detail":"Not Found"}"#),
        ),
    };

    apply_cors(req.headers(), response.headers_mut());
    response
}

fn vehicle_data_response(store: &TelemetryStore) -> Response<Full<Bytes>> {
    let snapshot = store.read();
    match serde_json::to_vec(&snapshot) {
        Ok(body) => json_response(StatusCode::OK, Bytes::from(body)),
        Err(e) => {
            log::error!("Failed to serialize snapshot: {}", e);
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"detail":"Internal Server Error"}"#),
            )
        }
    }
}

fn preflight_response(request_headers: &HeaderMap) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(b"OK")));
    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(PREFLIGHT_METHODS),
    );
    let allowed_headers = request_headers
        .get(ACCESS_CONTROL_REQUEST_HEADERS)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, allowed_headers);
    headers.insert(
        ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(PREFLIGHT_MAX_AGE),
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

fn json_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Allow any origin; credentials are allowed by echoing the caller's origin
fn apply_cors(request_headers: &HeaderMap, response_headers: &mut HeaderMap) {
    match request_headers.get(ORIGIN) {
        Some(origin) => {
            response_headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            response_headers.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            response_headers.insert(VARY, HeaderValue::from_static("Origin"));
        }
        None => {
            response_headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_SIGNAL_ID;
    use http_body_util::BodyExt;

    fn get(path: &str) -> Request<()> {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(())
            .unwrap()
    }

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_vehicle_data_returns_snapshot() {
        let store = TelemetryStore::new(DEFAULT_SIGNAL_ID);

        let response = handle_request(&get(VEHICLE_DATA_PATH), &store);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let body = body_string(response).await;
        assert_eq!(body, r#"{"M170_Internal_States.INV_Inverter_State":8}"#);
    }

    #[tokio::test]
    async fn test_vehicle_data_follows_toggle() {
        let store = TelemetryStore::new(DEFAULT_SIGNAL_ID);

        let first = body_string(handle_request(&get(VEHICLE_DATA_PATH), &store)).await;
        let second = body_string(handle_request(&get(VEHICLE_DATA_PATH), &store)).await;
        assert_eq!(first, second);

        store.toggle();
        let body = body_string(handle_request(&get(VEHICLE_DATA_PATH), &store)).await;
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value[DEFAULT_SIGNAL_ID], 9);
    }

    #[test]
    fn test_unknown_route_is_not_found() {
        let store = TelemetryStore::new(DEFAULT_SIGNAL_ID);

        let response = handle_request(&get("/vehicle"), &store);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn test_write_method_is_rejected() {
        let store = TelemetryStore::new(DEFAULT_SIGNAL_ID);
        let req = Request::builder()
            .method(Method::POST)
            .uri(VEHICLE_DATA_PATH)
            .body(())
            .unwrap();

        let response = handle_request(&req, &store);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET");
        assert_eq!(store.read().state.raw(), 8);
    }

    #[test]
    fn test_origin_is_echoed_with_credentials() {
        let store = TelemetryStore::new(DEFAULT_SIGNAL_ID);
        let req = Request::builder()
            .method(Method::GET)
            .uri(VEHICLE_DATA_PATH)
            .header(ORIGIN, "http://localhost:5173")
            .body(())
            .unwrap();

        let response = handle_request(&req, &store);
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[test]
    fn test_preflight_allows_anything() {
        let store = TelemetryStore::new(DEFAULT_SIGNAL_ID);
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri(VEHICLE_DATA_PATH)
            .header(ORIGIN, "http://localhost:5173")
            .header("access-control-request-method", "GET")
            .header(ACCESS_CONTROL_REQUEST_HEADERS, "x-custom-header")
            .body(())
            .unwrap();

        let response = handle_request(&req, &store);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_METHODS], PREFLIGHT_METHODS);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_HEADERS], "x-custom-header");
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
    }

    #[test]
    fn test_bind_conflict_is_reported() {
        let store = TelemetryStore::new(DEFAULT_SIGNAL_ID);
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();

        let first = TelemetryServer::bind(addr, store.clone()).unwrap();
        let taken = first.local_addr().unwrap();

        let err = TelemetryServer::bind(taken, store).unwrap_err();
        assert!(matches!(err, MockError::Bind { addr, .. } if addr == taken));
    }
}
