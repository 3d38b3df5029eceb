use std::fmt;

use crate::context::TransactionContext;

/// How a new scope relates to an already active transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Propagation {
    /// Join the caller's physical transaction, or start one if there is none.
    #[default]
    Required,
    /// Always start an independent physical transaction, suspending the
    /// caller's one until the new transaction finishes.
    RequiresNew,
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("REQUIRED"),
            Self::RequiresNew => f.write_str("REQUIRES_NEW"),
        }
    }
}

/// Outcome of classifying a `begin` request against the current context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDecision {
    /// The new frame opens (and later finalizes) its own physical transaction.
    pub is_new: bool,
    /// The currently active physical transaction must be suspended first.
    pub suspend: bool,
}

/// Decides whether a new frame joins, starts, or isolates a physical transaction.
pub fn classify<P, S>(propagation: Propagation, context: &TransactionContext<P, S>) -> FrameDecision {
    let active = !context.is_empty();
    match propagation {
        Propagation::Required => FrameDecision {
            is_new: !active,
            suspend: false,
        },
        Propagation::RequiresNew => FrameDecision {
            is_new: true,
            suspend: active,
        },
    }
}
