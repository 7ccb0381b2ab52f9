mod line_search;
mod optimizer;
mod report;

pub use line_search::{LineSearchResult, TrustRegionLineSearch, initial_step_size};
pub use optimizer::{ConjugateGradientOptimizer, ParallelOptimizer, SerialOptimizer};
pub use report::{LineSearchOutcome, UpdateReport, Violation};
