pub mod estimator;

pub use estimator::{align, Alignment, PhonemeTiming};
