use std::num::NonZeroUsize;

use parallel_cg::{
    BarrierSync, Synchronizer, init_parallel_objects, spawn, storage::Phase,
};

fn run<T, F>(workers: usize, nparams: usize, entry: F) -> Vec<T>
where
    T: Send,
    F: Fn(BarrierSync) -> T + Sync,
{
    let shared = init_parallel_objects(NonZeroUsize::new(workers).unwrap(), nparams);
    spawn(&shared, entry).unwrap()
}

fn local_contribution(rank: usize, nparams: usize) -> Vec<f64> {
    (0..nparams).map(|i| (rank * 100 + i) as f64).collect()
}

#[test]
fn vector_reduction_is_an_exact_sum() {
    const NPARAMS: usize = 13;

    for workers in [1, 2, 4, 8] {
        let expected: Vec<f64> = (0..NPARAMS)
            .map(|i| (0..workers).map(|r| (r * 100 + i) as f64).sum())
            .collect();

        let outs = run(workers, NPARAMS, |sync| {
            let local = local_contribution(sync.rank(), NPARAMS);
            sync.reduce_vector(Phase::Gradient, &local).unwrap()
        });

        assert_eq!(outs.len(), workers);
        for out in outs {
            assert_eq!(out, expected, "workers={workers}");
        }
    }
}

#[test]
fn fewer_parameters_than_workers() {
    let outs = run(8, 3, |sync| {
        sync.reduce_vector(Phase::Gradient, &[1., 2., 3.]).unwrap()
    });

    for out in outs {
        assert_eq!(out, [8., 16., 24.]);
    }
}

#[test]
fn scalar_reduction_is_a_weighted_mean() {
    for workers in [1, 2, 4, 8] {
        let expected = (1..=workers).sum::<usize>() as f64 / workers as f64;

        let outs = run(workers, 1, |sync| {
            let [mean] = sync
                .reduce_scalars(Phase::Loss, [sync.rank() as f64 + 1.])
                .unwrap();
            sync.release(Phase::Loss);

            let [pair_mean, two] = sync
                .reduce_scalars(Phase::Backtrack, [sync.rank() as f64 + 1., 2.])
                .unwrap();
            sync.release(Phase::Backtrack);

            (mean, pair_mean, two)
        });

        for (mean, pair_mean, two) in outs {
            assert!((mean - expected).abs() < 1e-12, "workers={workers}");
            assert!((pair_mean - expected).abs() < 1e-12, "workers={workers}");
            assert!((two - 2.).abs() < 1e-12);
        }
    }
}

#[test]
fn hvp_reduction_regularizes_once() {
    for workers in [1, 2, 4, 8] {
        let outs = run(workers, 5, |sync| {
            let direction = [1., -1., 2., 0., 4.];
            sync.reduce_hvp(&[1.; 5], 0.25, &direction).unwrap()
        });

        let w = workers as f64;
        let expected = [w + 0.25, w - 0.25, w + 0.5, w, w + 1.];

        for out in outs {
            assert_eq!(out, expected, "workers={workers}");
        }
    }
}

#[test]
fn buffers_are_reusable_across_rounds() {
    const ROUNDS: usize = 50;
    const NPARAMS: usize = 7;
    const WORKERS: usize = 4;

    let outs = run(WORKERS, NPARAMS, |sync| {
        let mut seen = Vec::with_capacity(ROUNDS);

        for round in 0..ROUNDS {
            let local = vec![(sync.rank() + round) as f64; NPARAMS];
            let vector = sync.reduce_vector(Phase::Gradient, &local).unwrap();

            let [scalar, mean_rank] = sync
                .reduce_scalars(Phase::Backtrack, [round as f64, sync.rank() as f64])
                .unwrap();
            sync.release(Phase::Backtrack);

            seen.push((vector[0], scalar, mean_rank));
        }

        seen
    });

    for seen in &outs {
        for (round, &(vector, scalar, mean_rank)) in seen.iter().enumerate() {
            let expected = (0..WORKERS).map(|r| (r + round) as f64).sum::<f64>();
            assert_eq!(vector, expected);
            assert!((scalar - round as f64).abs() < 1e-12);
            assert!((mean_rank - 1.5).abs() < 1e-12);
        }
    }

    assert!(outs.windows(2).all(|w| w[0] == w[1]));
}
