/*!
 * Common test utilities: mock-backed pools and dispatcher builders so tests
 * never touch an external API.
 */

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use subfall::app_config::{PoolRole, Tone};
use subfall::pool::{Endpoint, EndpointPool};
use subfall::providers::mock::MockTranslator;
use subfall::providers::ChunkTranslator;
use subfall::translation::{DispatchOptions, Dispatcher, Line};

/// Wrap a mock transport as a pool endpoint with a generous ceiling
pub fn endpoint(name: &str, role: PoolRole, mock: Arc<MockTranslator>) -> Arc<Endpoint> {
    Arc::new(Endpoint::new(
        name,
        role,
        mock as Arc<dyn ChunkTranslator>,
        5,
        Duration::from_secs(5),
    ))
}

/// Build a pool over the given endpoints
pub fn pool(role: PoolRole, endpoints: Vec<Arc<Endpoint>>) -> Arc<EndpointPool> {
    Arc::new(EndpointPool::new(role, endpoints))
}

/// Dispatch options tuned for fast tests: default ceilings, tiny backoff
pub fn options() -> DispatchOptions {
    DispatchOptions {
        chunk_size: 10,
        retry_rounds: 3,
        max_attempts_per_chunk: 12,
        retry_backoff_ms: 1,
        tone: Tone::Conversational,
        strict_script_check: true,
    }
}

/// Dispatcher over the given pools with fast-test options
pub fn dispatcher(
    primary: Arc<EndpointPool>,
    fallback: Arc<EndpointPool>,
    options: DispatchOptions,
) -> Dispatcher {
    Dispatcher::new(primary, fallback, BTreeMap::new(), options)
}

/// `n` ASCII source lines, indexed 1..=n
pub fn lines(n: usize) -> Vec<Line> {
    (1..=n)
        .map(|i| Line::new(i, format!("source line {}", i)))
        .collect()
}
