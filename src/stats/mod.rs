//! Numerical support: distribution tails and small matrix inversion.

pub mod distributions;
pub mod linalg;

pub use distributions::{chi_square_sf, normal_cdf, normal_quantile, normal_two_sided_p};
