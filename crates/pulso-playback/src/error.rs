//! Error types for playback setup.

/// Errors surfaced while configuring playback. The render path itself
/// never fails: contention degrades to per-quantum skips by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The audio callback geometry was rejected.
    #[error("invalid quantum config: {0}")]
    InvalidQuantum(&'static str),
}
