/*!
 * Ring AllReduce simulation
 * Runs one collective engine per simulated server thread over an in-process
 * cluster, then checks every node against a locally computed sum.
 *
 * Usage: simulate_ring [nodes] [count]
 */

use anyhow::{bail, Context, Result};
use rand::Rng;
use ring_collective::{
    init_logging, CollectiveConfig, CollectiveEngine, LocalCluster, NodeRole,
};
use std::time::Instant;

const DEFAULT_NODES: u32 = 4;
const DEFAULT_COUNT: usize = 1 << 16;
const TOLERANCE: f32 = 1e-3;

fn parse_arg<T: std::str::FromStr>(arg: Option<String>, default: T, name: &str) -> Result<T> {
    match arg {
        Some(value) => value
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid {}: {}", name, value)),
        None => Ok(default),
    }
}

fn main() -> Result<()> {
    let config = CollectiveConfig::load_from_environment()
        .context("failed to read RING_COLLECTIVE_* environment")?;
    init_logging(config.verbosity);

    let mut args = std::env::args().skip(1);
    let nodes: u32 = parse_arg(args.next(), DEFAULT_NODES, "node count")?;
    let count: usize = parse_arg(args.next(), DEFAULT_COUNT, "element count")?;
    if nodes == 0 {
        bail!("node count must be at least 1");
    }

    println!("Running ring AllReduce simulation");
    println!("=================================");
    println!("nodes: {}, elements per node: {}", nodes, count);

    let mut rng = rand::thread_rng();
    let inputs: Vec<Vec<f32>> = (0..nodes)
        .map(|_| (0..count).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect();
    let expected: Vec<f32> = (0..count)
        .map(|j| inputs.iter().map(|input| input[j]).sum())
        .collect();

    let cluster = LocalCluster::new(0, nodes);
    let start = Instant::now();
    let outputs = std::thread::scope(|scope| -> Result<Vec<Vec<f32>>> {
        let handles: Vec<_> = cluster
            .nodes(NodeRole::Server)
            .into_iter()
            .zip(&inputs)
            .map(|(node, input)| {
                let config = config.clone();
                scope.spawn(move || -> Result<Vec<f32>> {
                    let engine = CollectiveEngine::new(config);
                    engine.initialize(node)?;
                    let mut output = vec![0.0f32; input.len()];
                    engine.all_reduce(input, &mut output)?;
                    Ok(output)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| anyhow::anyhow!("simulated node panicked"))?
            })
            .collect()
    })?;
    let elapsed = start.elapsed();

    for (rank, output) in outputs.iter().enumerate() {
        let max_error = output
            .iter()
            .zip(&expected)
            .map(|(got, want)| (got - want).abs())
            .fold(0.0f32, f32::max);
        if max_error > TOLERANCE {
            bail!("rank {} differs from the expected sum by {}", rank, max_error);
        }
    }

    println!("✓ all {} nodes agree within {}", nodes, TOLERANCE);
    println!("elapsed: {:.2?}", elapsed);
    Ok(())
}
