use thiserror::Error;

/// Failures surfaced by cache operations.
///
/// Only the flush path can fail: a backing store may reject a batch, in
/// which case the cache is left untouched so the caller can retry. Logic
/// errors such as overwriting a live output or violating the flag rules
/// during a batch merge are programming bugs and panic instead.
#[derive(Debug, Error)]
pub enum CoinsError {
    #[error("backing view is read-only")]
    ReadOnlyBacking,
    #[error("{0}")]
    Backing(&'static str),
}
