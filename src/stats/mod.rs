pub mod order;

pub use order::{Moments, Percentiles};
