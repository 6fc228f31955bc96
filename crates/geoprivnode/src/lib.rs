//! geopriv-node: HTTP transport for the geofence protocol.
//! - [`HttpEvaluator`]: blocking client side of the evaluator contract
//! - [`router`] / [`serve`]: axum service wrapping a [`LocalEvaluator`]
//! - [`init_tracing`]: subscriber setup shared by the binaries

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use geoprivalgo::{EvaluationResponse, Evaluator, GeofenceError, GeofenceQuery, LocalEvaluator, Shape};
use geoprivcrypto::PaillierPublicKey;
use geoprivproto::{WireQuery, WireReply};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:5000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Install a global `fmt` subscriber. An unparsable filter falls back to `info`.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

// ------- Client side -------

/// Remote evaluator reached over HTTP GET. One request per query, no
/// retries; every failure is returned to the caller.
pub struct HttpEvaluator {
    client: reqwest::blocking::Client,
    base: String,
}

impl HttpEvaluator {
    pub fn new(base: &str, timeout: Duration) -> geoprivalgo::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeofenceError::Transport(e.to_string()))?;
        Ok(HttpEvaluator {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, shape: Shape) -> String {
        format!("{}{}", self.base, shape.path())
    }
}

impl Evaluator for HttpEvaluator {
    fn evaluate(&mut self, pk: &PaillierPublicKey, query: &GeofenceQuery) -> geoprivalgo::Result<EvaluationResponse> {
        let shape = query.shape();
        let url = self.url(shape);
        let resp = self
            .client
            .get(&url)
            .query(&query.to_wire(pk))
            .send()
            .map_err(|e| GeofenceError::Transport(format!("{url}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GeofenceError::Transport(format!("{url} answered {status}")));
        }
        let body = resp
            .bytes()
            .map_err(|e| GeofenceError::Transport(format!("{url}: {e}")))?;
        tracing::debug!(%url, bytes = body.len(), "evaluator replied");
        let reply = WireReply::parse(shape, &body)
            .map_err(|e| GeofenceError::MalformedResponse(e.to_string()))?;
        EvaluationResponse::from_wire(pk, &reply)
    }
}

// ------- Service side -------

pub fn router(evaluator: Arc<LocalEvaluator>) -> Router {
    Router::new()
        .route(Shape::AxisAligned.path(), get(calculate))
        .route(Shape::Rotated.path(), get(calculate_rotated))
        .with_state(evaluator)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, evaluator: Arc<LocalEvaluator>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(evaluator))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn calculate(
    State(evaluator): State<Arc<LocalEvaluator>>,
    Query(wire): Query<WireQuery>,
) -> Result<Response, (StatusCode, String)> {
    answer(evaluator, Shape::AxisAligned, wire).await
}

async fn calculate_rotated(
    State(evaluator): State<Arc<LocalEvaluator>>,
    Query(wire): Query<WireQuery>,
) -> Result<Response, (StatusCode, String)> {
    answer(evaluator, Shape::Rotated, wire).await
}

async fn answer(evaluator: Arc<LocalEvaluator>, shape: Shape, wire: WireQuery) -> Result<Response, (StatusCode, String)> {
    // modular exponentiations: keep them off the async workers
    let reply = tokio::task::spawn_blocking(move || -> geoprivalgo::Result<WireReply> {
        let (pk, query) = GeofenceQuery::from_wire(shape, &wire)?;
        let resp = evaluator.evaluate_query(&pk, &query)?;
        Ok(resp.to_wire(Some(pk.key_id())))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    .map_err(|e| {
        tracing::warn!(%shape, error = %e, "rejected query");
        (StatusCode::BAD_REQUEST, e.to_string())
    })?;
    let body = reply
        .to_json()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    tracing::info!(%shape, "answered query");
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoprivalgo::fixtures::DEMO_POINTS;
    use geoprivalgo::{FenceSet, GeofenceClient, LocalEvaluator, ProtocolConfig};
    use std::net::SocketAddr;

    fn spawn(app: Router) -> SocketAddr {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                tx.send(listener.local_addr().unwrap()).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });
        rx.recv().unwrap()
    }

    fn colorado_service() -> SocketAddr {
        let cfg = ProtocolConfig::default();
        let evaluator = LocalEvaluator::new(&FenceSet::colorado(), &cfg).unwrap();
        spawn(router(Arc::new(evaluator)))
    }

    fn http_client(addr: SocketAddr, timeout: Duration) -> GeofenceClient<HttpEvaluator> {
        let evaluator = HttpEvaluator::new(&format!("http://{addr}/"), timeout).unwrap();
        GeofenceClient::generate(512, ProtocolConfig::default(), evaluator, &mut rand::thread_rng()).unwrap()
    }

    #[test]
    fn http_verdicts_match_in_process_verdicts() {
        let addr = colorado_service();
        let mut remote = http_client(addr, DEFAULT_TIMEOUT);
        let local_eval = LocalEvaluator::new(&FenceSet::colorado(), &ProtocolConfig::default()).unwrap();
        let mut local =
            GeofenceClient::generate(512, ProtocolConfig::default(), local_eval, &mut rand::thread_rng()).unwrap();
        for demo in DEMO_POINTS {
            assert_eq!(
                remote.check_both(demo.point).unwrap(),
                local.check_both(demo.point).unwrap(),
                "{}",
                demo.label
            );
        }
    }

    #[test]
    fn service_rejects_unusable_queries() {
        let addr = colorado_service();
        let client = reqwest::blocking::Client::new();
        let resp = client
            .get(format!("http://{addr}/calculate"))
            .query(&[("g", "12"), ("n", "abc"), ("lat", "1"), ("lng", "1")])
            .send()
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

        // even modulus: not a public key
        let resp = client
            .get(format!("http://{addr}/calculate_rotated"))
            .query(&[("g", "11"), ("n", "10"), ("lat", "3"), ("lng", "7")])
            .send()
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

        let resp = client.get(format!("http://{addr}/calculate")).send().unwrap();
        assert!(resp.status().is_client_error());
    }

    #[test]
    fn unreachable_evaluator_is_a_transport_error() {
        // grab a free port, then release it so nothing is listening
        let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let mut c = http_client(addr, Duration::from_secs(5));
        assert!(matches!(
            c.check(Shape::AxisAligned, DEMO_POINTS[3].point),
            Err(GeofenceError::Transport(_))
        ));
    }

    #[test]
    fn error_status_is_a_transport_error() {
        let app = Router::new().route(
            Shape::Rotated.path(),
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let mut c = http_client(spawn(app), DEFAULT_TIMEOUT);
        assert!(matches!(
            c.check(Shape::Rotated, DEMO_POINTS[3].point),
            Err(GeofenceError::Transport(_))
        ));
    }

    #[test]
    fn incomplete_body_is_malformed() {
        let app = Router::new().route(
            Shape::AxisAligned.path(),
            get(|| async { r#"{"lat": 1, "lat2": 2}"# }),
        );
        let mut c = http_client(spawn(app), DEFAULT_TIMEOUT);
        assert!(matches!(
            c.check(Shape::AxisAligned, DEMO_POINTS[0].point),
            Err(GeofenceError::MalformedResponse(_))
        ));
    }

    #[test]
    fn slow_evaluator_times_out() {
        let app = Router::new().route(
            Shape::AxisAligned.path(),
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        );
        let mut c = http_client(spawn(app), Duration::from_millis(300));
        assert!(matches!(
            c.check(Shape::AxisAligned, DEMO_POINTS[0].point),
            Err(GeofenceError::Transport(_))
        ));
    }
}
