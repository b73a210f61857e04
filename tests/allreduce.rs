//! Integration tests for AllReduce over the in-process cluster.

mod common;

use approx::assert_abs_diff_eq;
use common::*;
use ndarray::Array2;
use ring_collective::*;
use std::time::{Duration, Instant};

fn all_reduce_sequential(nodes: u32, count: usize) {
    let cluster = LocalCluster::new(0, nodes);
    let inputs = create_sequential_inputs(nodes, count);
    let expected = expected_sum_i64(&inputs);

    let outputs = run_on_servers(&cluster, &create_test_config(), |rank, engine, _| {
        let mut recv = vec![0i64; count];
        engine
            .all_reduce(&inputs[rank as usize], &mut recv)
            .expect("all_reduce");
        recv
    });

    assert_eq!(outputs.len(), nodes as usize);
    for (rank, output) in outputs.iter().enumerate() {
        assert_eq!(
            output, &expected,
            "rank {} of {} nodes, count {}",
            rank, nodes, count
        );
    }
}

#[test]
fn test_four_nodes_eight_elements() {
    let cluster = LocalCluster::new(0, 4);
    let inputs = create_sequential_inputs(4, 8);

    let outputs = run_on_servers(&cluster, &create_test_config(), |rank, engine, _| {
        let mut recv = vec![0i64; 8];
        engine.all_reduce(&inputs[rank as usize], &mut recv).unwrap();
        recv
    });

    let expected: Vec<i64> = (0..8).map(|j| 4 * j + 48).collect();
    for output in outputs {
        assert_eq!(output, expected);
    }
}

#[test]
fn test_uneven_chunking() {
    for (nodes, count) in [(3, 10), (4, 7), (5, 13), (2, 3), (6, 6)] {
        all_reduce_sequential(nodes, count);
    }
}

#[test]
fn test_fewer_elements_than_nodes() {
    for (nodes, count) in [(2, 1), (5, 3), (4, 1)] {
        all_reduce_sequential(nodes, count);
    }
}

#[test]
fn test_zero_elements() {
    let cluster = LocalCluster::new(0, 3);
    let results = run_on_servers(&cluster, &create_test_config(), |_, engine, _| {
        let send: [u32; 0] = [];
        let mut recv: [u32; 0] = [];
        engine.all_reduce(&send, &mut recv)
    });
    assert!(results.iter().all(|r| r.is_ok()));
}

#[test]
fn test_f32_sum_within_tolerance() {
    let nodes = 5;
    let count = 1031;
    let cluster = LocalCluster::new(0, nodes);
    let inputs = create_random_inputs(nodes, count, 42);
    let expected = expected_sum_f32(&inputs);

    let outputs = run_on_servers(&cluster, &create_test_config(), |rank, engine, _| {
        let mut recv = vec![0.0f32; count];
        engine.all_reduce(&inputs[rank as usize], &mut recv).unwrap();
        recv
    });

    for output in &outputs {
        for (got, want) in output.iter().zip(&expected) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-3);
        }
    }
    // Same topology, same reduction order: every node agrees bit for bit.
    assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn test_min_and_max_ops() {
    let cluster = LocalCluster::new(0, 3);
    let outputs = run_on_servers(&cluster, &create_test_config(), |rank, engine, _| {
        let send: Vec<i32> = (0..6).map(|j| (j - rank as i32) * (rank as i32 + 1)).collect();
        let mut min = vec![0; 6];
        let mut max = vec![0; 6];
        engine
            .all_reduce_with_op(&send, &mut min, ReduceOp::Min)
            .unwrap();
        engine
            .all_reduce_with_op(&send, &mut max, ReduceOp::Max)
            .unwrap();
        (min, max)
    });

    let inputs: Vec<Vec<i32>> = (0..3)
        .map(|rank: i32| (0..6).map(|j| (j - rank) * (rank + 1)).collect())
        .collect();
    let expected_min: Vec<i32> = (0..6)
        .map(|j| inputs.iter().map(|v| v[j]).min().unwrap())
        .collect();
    let expected_max: Vec<i32> = (0..6)
        .map(|j| inputs.iter().map(|v| v[j]).max().unwrap())
        .collect();

    for (min, max) in outputs {
        assert_eq!(min, expected_min);
        assert_eq!(max, expected_max);
    }
}

#[test]
fn test_recv_longer_than_send_keeps_tail() {
    let cluster = LocalCluster::new(0, 2);
    let outputs = run_on_servers(&cluster, &create_test_config(), |rank, engine, _| {
        let send = vec![rank as u64 + 1; 3];
        let mut recv = vec![99u64; 5];
        engine.all_reduce(&send, &mut recv).unwrap();
        recv
    });

    for output in outputs {
        assert_eq!(output, vec![3, 3, 3, 99, 99]);
    }
}

#[test]
fn test_sync_helpers() {
    let cluster = LocalCluster::new(0, 4);
    let outputs = run_on_servers(&cluster, &create_test_config(), |rank, engine, _| {
        let value = rank as f64 + 1.0;
        (
            engine.sync_up_by_sum(value).unwrap(),
            engine.sync_up_by_min(value).unwrap(),
            engine.sync_up_by_max(value).unwrap(),
            engine.sync_up_by_mean(value).unwrap(),
            engine.global_sum(&[rank as i32, 1, -(rank as i32)]).unwrap(),
        )
    });

    for (sum, min, max, mean, global) in outputs {
        assert_abs_diff_eq!(sum, 10.0);
        assert_abs_diff_eq!(min, 1.0);
        assert_abs_diff_eq!(max, 4.0);
        assert_abs_diff_eq!(mean, 2.5);
        assert_eq!(global, vec![6, 4, -6]);
    }
}

#[test]
fn test_all_reduce_ndarray() {
    let cluster = LocalCluster::new(0, 3);
    let outputs = run_on_servers(&cluster, &create_test_config(), |rank, engine, _| {
        let mut array = Array2::from_elem((4, 5), rank as f64);
        engine.all_reduce_array(&mut array, ReduceOp::Sum).unwrap();
        array
    });

    for array in outputs {
        assert_eq!(array.dim(), (4, 5));
        assert!(array.iter().all(|&v| v == 3.0));
    }
}

#[test]
fn test_single_node_is_identity() {
    let cluster = LocalCluster::new(0, 1);
    let outputs = run_on_servers(&cluster, &create_test_config(), |_, engine, _| {
        let send = [5i8, -3, 7];
        let mut recv = [0i8; 3];
        engine.all_reduce(&send, &mut recv).unwrap();

        let mut in_place = [1.5f32, 2.5];
        engine
            .all_reduce_in_place(&mut in_place, ReduceOp::Prod)
            .unwrap();
        (recv, in_place)
    });

    assert_eq!(outputs[0].0, [5, -3, 7]);
    assert_eq!(outputs[0].1, [1.5, 2.5]);
}

#[test]
fn test_timeout_when_peer_never_arrives() {
    let cluster = LocalCluster::new(0, 3);
    let engine = CollectiveEngine::new(create_short_timeout_config(100));
    engine
        .initialize(cluster.node(NodeRole::Server, 0))
        .unwrap();

    let start = Instant::now();
    let mut recv = vec![0.0f32; 9];
    let err = engine.all_reduce(&[1.0; 9], &mut recv).unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, CollectiveError::Timeout { .. }));
    assert!(err.is_recoverable());
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);
}

#[test]
fn test_send_to_dead_root_fails() {
    let cluster = LocalCluster::new(0, 2);
    cluster.disconnect(NodeRole::Server, 0);

    let engine = CollectiveEngine::new(create_short_timeout_config(100));
    engine
        .initialize(cluster.node(NodeRole::Server, 1))
        .unwrap();

    let mut recv = [0u32; 1];
    let err = engine.all_reduce(&[7], &mut recv).unwrap_err();
    match err {
        CollectiveError::Timeout { operation, .. } => assert_eq!(operation, "send"),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_engine_usable_after_failed_call() {
    let cluster = LocalCluster::new(0, 2);
    let engine = CollectiveEngine::new(create_short_timeout_config(50));
    engine
        .initialize(cluster.node(NodeRole::Server, 0))
        .unwrap();

    let mut recv = [0i64; 4];
    assert!(engine.all_reduce(&[1, 2, 3, 4], &mut recv).is_err());

    assert!(engine.is_initialized());
    assert!(engine.group_view().is_some());
    let err = engine.all_reduce(&[1, 2, 3, 4], &mut recv).unwrap_err();
    assert_eq!(err.category(), "timeout");
}

#[test]
fn test_u8_sum_wraps_past_255() {
    let cluster = LocalCluster::new(0, 2);
    let outputs = run_on_servers(&cluster, &create_test_config(), |_, engine, _| {
        let mut wrapped = [0u8; 2];
        engine.all_reduce(&[200, 200], &mut wrapped).unwrap();

        // The engine must still be usable after an overflowing reduction.
        let mut next = [0u8; 1];
        engine.all_reduce(&[1], &mut next).unwrap();
        (wrapped, next)
    });

    for (wrapped, next) in outputs {
        assert_eq!(wrapped, [144, 144]);
        assert_eq!(next, [2]);
    }
}

#[test]
fn test_integer_product_wraps() {
    let cluster = LocalCluster::new(0, 3);
    let outputs = run_on_servers(&cluster, &create_test_config(), |_, engine, _| {
        let mut recv = [0i32; 3];
        engine
            .all_reduce_with_op(&[i32::MAX, 2, 3], &mut recv, ReduceOp::Prod)
            .unwrap();
        recv
    });

    let expected = [
        i32::MAX.wrapping_mul(i32::MAX).wrapping_mul(i32::MAX),
        8,
        27,
    ];
    for output in outputs {
        assert_eq!(output, expected);
    }
}

#[test]
fn test_failed_calls_release_requests() {
    let cluster = LocalCluster::new(0, 2);
    let node = cluster.node(NodeRole::Server, 0);
    let engine = CollectiveEngine::new(create_short_timeout_config(30));
    engine.initialize(node.clone()).unwrap();

    let mut recv = [0i32; 4];
    for _ in 0..5 {
        let err = engine.all_reduce(&[1, 2, 3, 4], &mut recv).unwrap_err();
        assert!(matches!(err, CollectiveError::Timeout { .. }));
    }
    assert_eq!(node.pending_requests(), 0);
}

#[test]
fn test_concurrent_calls_on_one_engine_are_serialized() {
    let cluster = LocalCluster::new(0, 2);
    let shared = CollectiveEngine::new(create_test_config());
    shared
        .initialize(cluster.node(NodeRole::Server, 0))
        .unwrap();
    let peer = CollectiveEngine::new(create_test_config());
    peer.initialize(cluster.node(NodeRole::Server, 1)).unwrap();

    let (first, second, peer_results) = std::thread::scope(|scope| {
        let first = scope.spawn(|| {
            let mut recv = [0i64; 2];
            shared.all_reduce(&[1, 1], &mut recv).unwrap();
            (recv, Instant::now())
        });

        // Give the first caller time to take the engine lock.
        std::thread::sleep(Duration::from_millis(50));
        let second = scope.spawn(|| {
            let started = Instant::now();
            let mut recv = [0i64; 2];
            shared.all_reduce(&[2, 2], &mut recv).unwrap();
            (recv, started, Instant::now())
        });

        // The peer answers late, one call at a time.
        let peer_results = scope.spawn(|| {
            std::thread::sleep(Duration::from_millis(200));
            let mut a = [0i64; 2];
            peer.all_reduce(&[10, 10], &mut a).unwrap();
            let mut b = [0i64; 2];
            peer.all_reduce(&[100, 100], &mut b).unwrap();
            (a, b)
        });

        (
            first.join().unwrap(),
            second.join().unwrap(),
            peer_results.join().unwrap(),
        )
    });

    let (first_recv, first_done) = first;
    let (second_recv, second_started, second_done) = second;
    assert_eq!(first_recv, [11, 11]);
    assert_eq!(second_recv, [102, 102]);
    assert_eq!(peer_results, ([11, 11], [102, 102]));

    // The second caller was blocked on the lock while the first ran.
    assert!(second_started < first_done);
    assert!(second_done >= first_done);
    assert!(second_done.duration_since(second_started) >= Duration::from_millis(100));
}
