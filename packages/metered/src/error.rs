use thiserror::Error;

/// Errors that can occur when querying metric data.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller asked a snapshot for a quantile outside the `[0, 1]` range.
    #[error("quantile {quantile} is not in [0..1]")]
    InvalidQuantile {
        /// The quantile that was requested.
        quantile: f64,
    },
}

/// A specialized `Result` type for metric queries, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
