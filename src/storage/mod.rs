mod accumulator;
mod barriers;
mod buffer;

pub use accumulator::ScalarAccumulator;
pub use barriers::{BarrierSet, GATHER, Phase, REDUCE, RELEASE};
pub use buffer::{SharedReductionBuffer, init_parallel_objects};
