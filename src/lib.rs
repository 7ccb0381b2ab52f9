pub mod config;
pub mod curvature;
pub mod error;
pub mod execution;
pub mod objective;
pub mod optimization;
pub mod partition;
pub mod solve;
pub mod storage;
pub mod synchronization;

pub use config::{CurvatureSpec, OptimizerConfig};
pub use error::{OptimizeErr, Result};
pub use execution::spawn;
pub use objective::{FlatParams, Objective, Parameterized};
pub use optimization::{
    ConjugateGradientOptimizer, LineSearchOutcome, ParallelOptimizer, SerialOptimizer,
    UpdateReport, Violation,
};
pub use partition::{WorkRange, partition};
pub use storage::{SharedReductionBuffer, init_parallel_objects};
pub use synchronization::{BarrierSync, SoloSync, Synchronizer};
