pub mod precision;
pub mod quantize;

pub use precision::PrecisionResolver;
pub use quantize::{quantize_price, quantize_quantity};
