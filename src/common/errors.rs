use thiserror::Error;

/// Faults the engine surfaces as typed errors.
///
/// Everything else degrades gracefully — no source means no data, a stale
/// disconnect is swallowed, out-of-range parameters are clamped. Only
/// context construction and configuration parsing are worth propagating.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The audio processing context could not be created. This is the
    /// single propagation point for capability failures: callers check it
    /// once at initialization.
    #[error("audio context unavailable: {0}")]
    ContextUnavailable(String),

    /// A configuration file or stored blob could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}
