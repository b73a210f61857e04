//! Common test utilities for ring collective integration tests.
#![allow(dead_code)]

use rand::prelude::*;
use ring_collective::*;
use std::sync::Arc;
use std::time::Duration;

/// Timeout used by tests that expect every peer to show up
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration with the test timeout
pub fn create_test_config() -> CollectiveConfig {
    ConfigBuilder::new()
        .timeout(TEST_TIMEOUT)
        .build()
        .expect("valid test config")
}

/// Configuration with a short timeout for failure scenarios
pub fn create_short_timeout_config(timeout_ms: u64) -> CollectiveConfig {
    ConfigBuilder::new()
        .timeout_ms(timeout_ms)
        .build()
        .expect("valid test config")
}

/// Run `f` on every server of `cluster` in its own thread, each with its own
/// engine already initialized against that server. Results are in rank order.
pub fn run_on_servers<R, F>(cluster: &LocalCluster, config: &CollectiveConfig, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(Rank, &CollectiveEngine, &Arc<LocalNode>) -> R + Sync,
{
    let nodes = cluster.nodes(NodeRole::Server);
    std::thread::scope(|scope| {
        let handles: Vec<_> = nodes
            .into_iter()
            .enumerate()
            .map(|(rank, node)| {
                let f = &f;
                let config = config.clone();
                scope.spawn(move || {
                    let engine = CollectiveEngine::new(config);
                    engine
                        .initialize(node.clone())
                        .expect("engine initialization");
                    f(rank as Rank, &engine, &node)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("node thread panicked"))
            .collect()
    })
}

/// Run `f` on every node of `role` in its own thread with an unbound engine,
/// for operations that take the node per call. Results are in rank order.
pub fn run_on_role<R, F>(
    cluster: &LocalCluster,
    role: NodeRole,
    config: &CollectiveConfig,
    f: F,
) -> Vec<R>
where
    R: Send,
    F: Fn(Rank, &CollectiveEngine, &LocalNode) -> R + Sync,
{
    let nodes = cluster.nodes(role);
    std::thread::scope(|scope| {
        let handles: Vec<_> = nodes
            .into_iter()
            .enumerate()
            .map(|(rank, node)| {
                let f = &f;
                let config = config.clone();
                scope.spawn(move || {
                    let engine = CollectiveEngine::new(config);
                    f(rank as Rank, &engine, &*node)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("node thread panicked"))
            .collect()
    })
}

/// Seeded random `f32` inputs, one vector per node
pub fn create_random_inputs(nodes: u32, count: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..nodes)
        .map(|_| (0..count).map(|_| rng.gen_range(-10.0..10.0)).collect())
        .collect()
}

/// Deterministic integer inputs: node `r` holds `r * count + j` at index `j`
pub fn create_sequential_inputs(nodes: u32, count: usize) -> Vec<Vec<i64>> {
    (0..nodes as i64)
        .map(|rank| (0..count as i64).map(|j| rank * count as i64 + j).collect())
        .collect()
}

/// Elementwise sum of all nodes' inputs, accumulated in `f64`
pub fn expected_sum_f32(inputs: &[Vec<f32>]) -> Vec<f32> {
    let count = inputs.first().map(|v| v.len()).unwrap_or(0);
    (0..count)
        .map(|j| inputs.iter().map(|input| input[j] as f64).sum::<f64>() as f32)
        .collect()
}

/// Elementwise sum of all nodes' integer inputs
pub fn expected_sum_i64(inputs: &[Vec<i64>]) -> Vec<i64> {
    let count = inputs.first().map(|v| v.len()).unwrap_or(0);
    (0..count)
        .map(|j| inputs.iter().map(|input| input[j]).sum())
        .collect()
}
