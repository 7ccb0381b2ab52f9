use std::{env, error::Error, num::NonZeroUsize, str::FromStr};

use anyhow::Context;
use log::info;
use rand::{SeedableRng, rngs::StdRng};

use parallel_cg::{
    FlatParams, OptimizerConfig, ParallelOptimizer, Parameterized, Synchronizer,
    init_parallel_objects, objective::LeastSquares, partition, spawn,
};

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_UPDATES: usize = 10;
const DATA_SEED: u64 = 42;
const SAMPLES: usize = 4096;
const DIM: usize = 16;
const NOISE: f64 = 0.1;

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value.parse().with_context(|| format!("parsing {key}")),
        Err(_) => Ok(default),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => OptimizerConfig::from_path(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => OptimizerConfig::default(),
    };

    let workers = NonZeroUsize::new(env_or("WORKERS", DEFAULT_WORKERS)?)
        .context("WORKERS must be positive")?;
    let updates: usize = env_or("UPDATES", DEFAULT_UPDATES)?;

    let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or(DATA_SEED));
    let (data, weights) = LeastSquares::generate(&mut rng, SAMPLES, DIM, NOISE)?;
    let shards = partition(SAMPLES, workers);
    let shared = init_parallel_objects(workers, DIM);

    info!("optimizing {DIM} parameters over {SAMPLES} samples with {workers} workers");

    let results = spawn(&shared, |sync| -> parallel_cg::Result<Vec<f64>> {
        let shard = &data[shards[sync.rank()].as_range()];
        let sync = sync.with_avg_fac(shard.len() as f64 / SAMPLES as f64);

        let mut optimizer = ParallelOptimizer::new(LeastSquares::new(DIM), sync, &config)?;
        let mut target = FlatParams::new(vec![0.; DIM]);

        for update in 0..updates {
            optimizer.objective_mut().set_anchor(target.params());
            let report = optimizer.optimize(&mut target, shard)?;

            if optimizer.sync().is_leader() {
                info!("update {update}: {report}");
            }
        }

        Ok(target.into_inner())
    })?;

    let params = results
        .into_iter()
        .next()
        .context("the pool has no workers")??;

    let distance = params
        .iter()
        .zip(&weights)
        .map(|(p, w)| (p - w) * (p - w))
        .sum::<f64>()
        .sqrt();

    info!("distance to the generating weights: {distance:.6}");
    Ok(())
}
