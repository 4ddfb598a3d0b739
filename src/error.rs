//! Error taxonomy for the poll pipeline.

use thiserror::Error;

/// The primary error type for a single account poll and for whole cycles.
///
/// Variants are ordered roughly by where in the pipeline they occur. A
/// failed account never stops the cycle on its own; only a run of
/// consecutive failures does (see [`CircuitOpen`](PollError::CircuitOpen)).
#[derive(Debug, Error)]
pub enum PollError {
    /// Remote feed errors (transport, authorization, malformed page body).
    #[error("fetching events for {handle:?}: {source}")]
    Fetch {
        handle: String,
        source: anyhow::Error,
    },

    /// The feed answered with a recommended poll interval we cannot read.
    /// An absent interval is not an error; a present-but-garbled one is.
    #[error("unreadable poll interval {value:?}")]
    Protocol {
        value: String,
        source: std::num::ParseIntError,
    },

    /// A payload of a supported event kind failed to decode. Unsupported
    /// kinds never produce this; they pass through undecoded.
    #[error("decoding {kind} payload: {source}")]
    PayloadParse {
        kind: String,
        source: serde_json::Error,
    },

    /// Store errors (listing accounts or filters, recording a poll result).
    /// A poll result that cannot be recorded suppresses dispatch, so an
    /// event is missed rather than delivered twice.
    #[error("poll store: {source}")]
    Persistence { source: anyhow::Error },

    /// A notification sink failed. Remaining dispatches for the account are
    /// abandoned; the watermark is already durable at this point.
    #[error("dispatching notification: {source}")]
    Dispatch { source: anyhow::Error },

    /// Too many accounts failed back-to-back within one cycle.
    #[error("aborting cycle after {failures} consecutive account failures")]
    CircuitOpen { failures: u32 },
}
