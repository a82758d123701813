/*!
 * Endpoint pools: credentialed transports grouped by role, each with its own
 * concurrency ceiling.
 *
 * A pool never holds chunk state; it owns the counting resource (a semaphore
 * per endpoint) and the per-endpoint health flag. Transport errors are
 * surfaced distinctly from content errors, which the pool never sees.
 */

use log::{debug, warn};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use crate::app_config::{Config, EndpointConfig, PoolRole};
use crate::errors::TransportError;
use crate::providers::gemini::GeminiEndpoint;
use crate::providers::{ChunkRequest, ChunkTranslator};
use crate::session::EndpointStats;

/// Base delay for the rate-limit backoff, doubled per consecutive hit
const BACKOFF_BASE_MS: u64 = 500;
/// Upper bound on a single backoff sleep
const BACKOFF_CAP_MS: u64 = 8_000;

/// Per-endpoint call counters, aggregated into session statistics at the end
#[derive(Debug, Default)]
struct EndpointCounters {
    calls: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    transport_errors: AtomicU64,
    latency_ms_total: AtomicU64,
}

/// One credentialed endpoint identity inside a pool
#[derive(Debug)]
pub struct Endpoint {
    /// Identity used in logs and statistics
    pub name: String,
    /// Pool role this identity belongs to
    pub role: PoolRole,
    transport: Arc<dyn ChunkTranslator>,
    semaphore: Arc<Semaphore>,
    capacity: usize,
    timeout: Duration,
    disabled: AtomicBool,
    rate_limit_streak: AtomicU32,
    counters: EndpointCounters,
}

impl Endpoint {
    /// Wrap a transport with a concurrency ceiling and per-call timeout
    pub fn new(
        name: impl Into<String>,
        role: PoolRole,
        transport: Arc<dyn ChunkTranslator>,
        concurrent_requests: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            transport,
            semaphore: Arc::new(Semaphore::new(concurrent_requests.max(1))),
            capacity: concurrent_requests.max(1),
            timeout,
            disabled: AtomicBool::new(false),
            rate_limit_streak: AtomicU32::new(0),
            counters: EndpointCounters::default(),
        }
    }

    /// Whether this identity has been taken out of rotation
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    /// Take this identity out of rotation permanently (auth failure)
    pub fn disable(&self) {
        if !self.disabled.swap(true, Ordering::SeqCst) {
            warn!("Endpoint {} disabled after authentication failure", self.name);
        }
    }

    /// Record the outcome of content validation for statistics
    pub fn record_content_outcome(&self, accepted: bool) {
        if accepted {
            self.counters.accepted.fetch_add(1, Ordering::SeqCst);
        } else {
            self.counters.rejected.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Snapshot this endpoint's counters
    pub fn stats(&self) -> EndpointStats {
        let calls = self.counters.calls.load(Ordering::SeqCst);
        let latency_total = self.counters.latency_ms_total.load(Ordering::SeqCst);
        EndpointStats {
            name: self.name.clone(),
            role: self.role,
            calls,
            accepted: self.counters.accepted.load(Ordering::SeqCst),
            rejected: self.counters.rejected.load(Ordering::SeqCst),
            transport_errors: self.counters.transport_errors.load(Ordering::SeqCst),
            mean_latency_ms: if calls > 0 { latency_total / calls } else { 0 },
            disabled: self.is_disabled(),
        }
    }

    fn backoff_delay(&self) -> Duration {
        let streak = self.rate_limit_streak.load(Ordering::SeqCst).min(8);
        let base = (BACKOFF_BASE_MS << streak).min(BACKOFF_CAP_MS);
        let jitter = rand::rng().random_range(0..BACKOFF_BASE_MS / 2);
        Duration::from_millis(base + jitter)
    }
}

/// A named group of endpoints sharing one role
#[derive(Debug)]
pub struct EndpointPool {
    /// Role of every endpoint in this pool
    pub role: PoolRole,
    endpoints: Vec<Arc<Endpoint>>,
}

impl EndpointPool {
    /// Build a pool from pre-constructed endpoints
    pub fn new(role: PoolRole, endpoints: Vec<Arc<Endpoint>>) -> Self {
        Self { role, endpoints }
    }

    /// Build the pool for a role from configuration, backed by Gemini
    /// transports
    pub fn from_config(config: &Config, role: PoolRole) -> Self {
        let endpoints = config
            .endpoints_with_role(role)
            .into_iter()
            .map(|ec: &EndpointConfig| {
                let transport = Arc::new(GeminiEndpoint::new(
                    ec.resolved_endpoint(&config.settings.model),
                    ec.api_key.clone(),
                    ec.timeout_secs,
                )) as Arc<dyn ChunkTranslator>;
                Arc::new(Endpoint::new(
                    ec.name.clone(),
                    role,
                    transport,
                    ec.concurrent_requests,
                    Duration::from_secs(ec.timeout_secs),
                ))
            })
            .collect();
        Self { role, endpoints }
    }

    /// Endpoints still in rotation
    pub fn usable(&self) -> Vec<Arc<Endpoint>> {
        self.endpoints
            .iter()
            .filter(|e| !e.is_disabled())
            .cloned()
            .collect()
    }

    /// True once every identity in this role is out of rotation
    pub fn is_exhausted(&self) -> bool {
        !self.endpoints.is_empty() && self.endpoints.iter().all(|e| e.is_disabled())
    }

    /// Number of configured identities, disabled ones included
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether the pool has no identities at all
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Sum of the concurrency ceilings of all identities
    pub fn total_capacity(&self) -> usize {
        self.endpoints.iter().map(|e| e.capacity).sum()
    }

    /// Counter snapshots for every identity
    pub fn endpoint_stats(&self) -> Vec<EndpointStats> {
        self.endpoints.iter().map(|e| e.stats()).collect()
    }

    /// Issue one call through an endpoint, respecting its ceiling.
    ///
    /// Excess calls queue on the semaphore. An elapsed per-call timeout is
    /// reported as `TransportError::Timeout`. On `RateLimited` the backoff
    /// sleep happens while the permit is still held, so the slot is not
    /// immediately reused against a throttling endpoint.
    pub async fn call(
        &self,
        endpoint: &Endpoint,
        request: &ChunkRequest,
    ) -> Result<String, TransportError> {
        let _permit = endpoint
            .semaphore
            .acquire()
            .await
            .map_err(|_| TransportError::Unreachable("endpoint pool closed".to_string()))?;

        endpoint.counters.calls.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            endpoint.timeout,
            endpoint.transport.translate_chunk(request),
        )
        .await;
        endpoint
            .counters
            .latency_ms_total
            .fetch_add(started.elapsed().as_millis() as u64, Ordering::SeqCst);

        let result = match outcome {
            Err(_elapsed) => Err(TransportError::Timeout),
            Ok(inner) => inner,
        };

        match &result {
            Ok(_) => {
                endpoint.rate_limit_streak.store(0, Ordering::SeqCst);
            }
            Err(TransportError::RateLimited) => {
                endpoint.counters.transport_errors.fetch_add(1, Ordering::SeqCst);
                endpoint.rate_limit_streak.fetch_add(1, Ordering::SeqCst);
                let delay = endpoint.backoff_delay();
                debug!(
                    "Endpoint {} rate limited, backing off {:?} before releasing slot",
                    endpoint.name, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(TransportError::AuthInvalid(_)) => {
                endpoint.counters.transport_errors.fetch_add(1, Ordering::SeqCst);
                endpoint.disable();
            }
            Err(_) => {
                endpoint.counters.transport_errors.fetch_add(1, Ordering::SeqCst);
            }
        }

        result
    }
}
