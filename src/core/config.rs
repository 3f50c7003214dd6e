//! Engine configuration

use crate::types::Points;

/// Tunables consumed by the exchange core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Bonus credited to an uploader when their listing is approved
    ///
    /// Zero disables the bonus.
    pub points_per_upload: Points,
}

impl ExchangeConfig {
    pub const DEFAULT_POINTS_PER_UPLOAD: Points = 50;

    pub fn new(points_per_upload: Points) -> Self {
        Self { points_per_upload }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_POINTS_PER_UPLOAD)
    }
}
