use strand_codec::CodecError;
use strand_router::RouteError;
use strand_source::SourceError;
use strand_store::StoreError;
use thiserror::Error;

/// Errors crossing the graph builder boundary.
///
/// Inside a pass these never escape: page loads and loader executions turn
/// them into error nodes. They surface only from operations that do not
/// produce a graph, such as merging a fragment into a long-lived store.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("route error: {0}")]
    Route(#[from] RouteError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("redirect loop at {0}")]
    RedirectLoop(String),

    #[error("no route for {0}")]
    NotFound(String),

    #[error("unexpected {found} payload for {expected}")]
    UnexpectedPayload { expected: String, found: String },

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("comment {anchor} not found in thread")]
    AnchorMissing { anchor: String },
}

pub type GraphResult<T> = Result<T, GraphError>;
