//! Metrics and tracing setup for shardmap.
//!
//! Provides a global [`NodeMetrics`] singleton backed by the `prometheus`
//! crate, plus an optional lightweight HTTP server for Prometheus scraping.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::net::SocketAddr;
use std::sync::OnceLock;

// ────────────────────────── Tracing ──────────────────────────

/// Initialize the tracing subscriber with env-filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

// ────────────────────────── Prometheus metrics ──────────────────────────

/// Global metrics instance.
static METRICS: OnceLock<NodeMetrics> = OnceLock::new();

/// Retrieve (or lazily create) the global metrics singleton.
pub fn metrics() -> &'static NodeMetrics {
    METRICS.get_or_init(NodeMetrics::new)
}

/// All Prometheus metrics for a shardmap node.
pub struct NodeMetrics {
    pub registry: Registry,

    // ── RPC counters ──
    pub rpcs_sent: IntCounter,
    pub rpcs_received: IntCounter,
    pub rpcs_sent_by_type: IntCounterVec,
    pub rpcs_received_by_type: IntCounterVec,

    // ── RPC latency ──
    pub rpc_latency_secs: HistogramVec,

    // ── DMap operation counters ──
    pub dmap_gets: IntCounter,
    pub dmap_puts: IntCounter,
    pub dmap_get_forwards: IntCounter,

    // ── DMap operation latency ──
    pub dmap_latency_secs: HistogramVec,

    // ── Read repair ──
    pub read_repairs: IntCounter,
    pub read_repair_writes: IntCounter,
}

// Manual Debug impl because prometheus types don't derive Debug.
impl std::fmt::Debug for NodeMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeMetrics").finish_non_exhaustive()
    }
}

/// Default histogram buckets (seconds) for RPC/DMap latency.
const LATENCY_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

impl NodeMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let rpcs_sent = IntCounter::with_opts(Opts::new(
            "shardmap_rpcs_sent_total",
            "Total outbound RPCs sent",
        ))
        .expect("rpcs_sent counter");
        let rpcs_received = IntCounter::with_opts(Opts::new(
            "shardmap_rpcs_received_total",
            "Total inbound RPCs received",
        ))
        .expect("rpcs_received counter");

        let rpcs_sent_by_type = IntCounterVec::new(
            Opts::new(
                "shardmap_rpcs_sent_by_type_total",
                "Outbound RPCs sent, by type",
            ),
            &["rpc_type"],
        )
        .expect("rpcs_sent_by_type counter vec");
        let rpcs_received_by_type = IntCounterVec::new(
            Opts::new(
                "shardmap_rpcs_received_by_type_total",
                "Inbound RPCs received, by type",
            ),
            &["rpc_type"],
        )
        .expect("rpcs_received_by_type counter vec");

        let rpc_latency_secs = HistogramVec::new(
            HistogramOpts::new("shardmap_rpc_latency_seconds", "RPC latency in seconds")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["rpc_type", "direction"],
        )
        .expect("rpc_latency_secs histogram");

        let dmap_gets =
            IntCounter::with_opts(Opts::new("shardmap_dmap_gets_total", "DMap GET operations"))
                .expect("dmap_gets counter");
        let dmap_puts =
            IntCounter::with_opts(Opts::new("shardmap_dmap_puts_total", "DMap PUT operations"))
                .expect("dmap_puts counter");
        let dmap_get_forwards = IntCounter::with_opts(Opts::new(
            "shardmap_dmap_get_forwards_total",
            "GETs forwarded to the partition owner",
        ))
        .expect("dmap_get_forwards counter");

        let dmap_latency_secs = HistogramVec::new(
            HistogramOpts::new(
                "shardmap_dmap_latency_seconds",
                "DMap operation latency in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["op_type"],
        )
        .expect("dmap_latency_secs histogram");

        let read_repairs = IntCounter::with_opts(Opts::new(
            "shardmap_read_repairs_total",
            "Read repair passes triggered",
        ))
        .expect("read_repairs counter");
        let read_repair_writes = IntCounter::with_opts(Opts::new(
            "shardmap_read_repair_writes_total",
            "Individual repair writes issued to stale copies",
        ))
        .expect("read_repair_writes counter");

        // Register all metrics
        registry
            .register(Box::new(rpcs_sent.clone()))
            .expect("register rpcs_sent");
        registry
            .register(Box::new(rpcs_received.clone()))
            .expect("register rpcs_received");
        registry
            .register(Box::new(rpcs_sent_by_type.clone()))
            .expect("register rpcs_sent_by_type");
        registry
            .register(Box::new(rpcs_received_by_type.clone()))
            .expect("register rpcs_received_by_type");
        registry
            .register(Box::new(rpc_latency_secs.clone()))
            .expect("register rpc_latency_secs");
        registry
            .register(Box::new(dmap_gets.clone()))
            .expect("register dmap_gets");
        registry
            .register(Box::new(dmap_puts.clone()))
            .expect("register dmap_puts");
        registry
            .register(Box::new(dmap_get_forwards.clone()))
            .expect("register dmap_get_forwards");
        registry
            .register(Box::new(dmap_latency_secs.clone()))
            .expect("register dmap_latency_secs");
        registry
            .register(Box::new(read_repairs.clone()))
            .expect("register read_repairs");
        registry
            .register(Box::new(read_repair_writes.clone()))
            .expect("register read_repair_writes");

        Self {
            registry,
            rpcs_sent,
            rpcs_received,
            rpcs_sent_by_type,
            rpcs_received_by_type,
            rpc_latency_secs,
            dmap_gets,
            dmap_puts,
            dmap_get_forwards,
            dmap_latency_secs,
            read_repairs,
            read_repair_writes,
        }
    }
}

/// Encode all registered metrics in Prometheus text exposition format.
pub fn encode_metrics() -> String {
    let m = metrics();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder
        .encode(&m.registry.gather(), &mut buf)
        .expect("prometheus text encoding");
    String::from_utf8(buf).expect("prometheus output is valid UTF-8")
}

/// Helper: start an RPC latency timer. Returns a guard that records
/// elapsed time on drop.
pub fn start_rpc_timer(rpc_type: &str, direction: &str) -> prometheus::HistogramTimer {
    metrics()
        .rpc_latency_secs
        .with_label_values(&[rpc_type, direction])
        .start_timer()
}

/// Helper: start a DMap operation latency timer.
pub fn start_dmap_timer(op_type: &str) -> prometheus::HistogramTimer {
    metrics()
        .dmap_latency_secs
        .with_label_values(&[op_type])
        .start_timer()
}

// ────────────────────────── Metrics HTTP server ──────────────────────────

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

async fn metrics_handler(
    _req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let body = encode_metrics();
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
        .expect("valid HTTP response"))
}

/// Serve Prometheus metrics on the given address (`GET /metrics`).
///
/// This spawns a lightweight HTTP/1.1 server. Call from a `tokio::spawn`.
pub async fn serve_metrics(
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("metrics server listening on http://{}/metrics", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(metrics_handler))
                .await
            {
                tracing::debug!("metrics connection error: {}", e);
            }
        });
    }
}

// ────────────────────────── Tests ──────────────────────────
