mod barrier;
mod solo;
mod synchronizer;

pub use barrier::BarrierSync;
pub use solo::SoloSync;
pub use synchronizer::Synchronizer;
