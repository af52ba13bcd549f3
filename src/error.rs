use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum VirtDomError {
    #[error("malformed domain document: {reason}")]
    MalformedDocument { reason: String },

    #[error("no free disk target for bus '{bus}'")]
    NoFreeTarget { bus: String },

    #[error("expected at most one <{tag}> child, found {count}")]
    AmbiguousChild { tag: String, count: usize },

    #[error("failed to serialize domain document")]
    Serialize {
        #[source]
        source: xmltree::Error,
    },

    #[error("serialized domain document is not valid UTF-8")]
    NonUtf8Output {
        #[source]
        source: std::string::FromUtf8Error,
    },
}
