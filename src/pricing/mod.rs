pub mod cost;
pub mod probability;
pub mod quote;

pub use cost::cost;
pub use probability::{collapsed, probabilities};
pub use quote::{quote, Quote, QuoteError};
