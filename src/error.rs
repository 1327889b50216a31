//! Error plumbing shared by the arena, rewriter, passes and emitter.
pub use anyhow::{anyhow, bail, Error, Result};

/// Distinguished failure kinds a caller may want to match on.
///
/// Carried as the payload of an [`anyhow::Error`][Error]; recover it with
/// `err.downcast_ref::<IrErrorKind>()` when the exact kind matters, or treat
/// the error as opaque otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrErrorKind {
    /// A core invariant broke: an unknown tag reached a dispatch, a
    /// memoized mapping was asked to change, or a node referenced another
    /// arena's node. Not recoverable.
    InvariantViolated(String),
    /// A pass or the emitter met a node shape it does not implement.
    UnsupportedOp { op: String, context: String },
    /// A higher-layer shape constraint failed on otherwise-valid IR.
    MalformedInput { node: String, detail: String },
}

impl std::fmt::Display for IrErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrErrorKind::InvariantViolated(msg) => write!(f, "invariant violated: {}", msg),
            IrErrorKind::UnsupportedOp { op, context } => {
                write!(f, "unsupported op `{}` in {}", op, context)
            }
            IrErrorKind::MalformedInput { node, detail } => {
                write!(f, "malformed input at `{}`: {}", node, detail)
            }
        }
    }
}

impl std::error::Error for IrErrorKind {}

impl IrErrorKind {
    pub fn invariant(msg: impl Into<String>) -> Error {
        Error::new(IrErrorKind::InvariantViolated(msg.into()))
    }
    pub fn unsupported(op: impl Into<String>, context: impl Into<String>) -> Error {
        Error::new(IrErrorKind::UnsupportedOp {
            op: op.into(),
            context: context.into(),
        })
    }
    pub fn malformed(node: impl Into<String>, detail: impl Into<String>) -> Error {
        Error::new(IrErrorKind::MalformedInput {
            node: node.into(),
            detail: detail.into(),
        })
    }
}
