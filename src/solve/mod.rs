mod cg;

pub use cg::ConjugateGradient;
