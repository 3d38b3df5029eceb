use std::fmt;

/// Opaque identifier of a frame, unique within one [`TransactionContext`](crate::TransactionContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(pub(crate) u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle returned by [`TransactionManager::begin`](crate::TransactionManager::begin).
///
/// Exactly one of `commit` or `rollback` must be called with it. The handle is
/// `Copy`; using it a second time is caught at runtime as
/// [`Error::FrameOrdering`](crate::Error::FrameOrdering).
///
/// Frame ids are only unique within the manager that issued the handle, and
/// every manager starts counting from the same value. A handle passed to a
/// different manager may match one of its frames; keep handles with the
/// manager they came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle {
    pub(crate) id: FrameId,
}

impl FrameHandle {
    pub fn id(&self) -> FrameId {
        self.id
    }
}

/// One level of nested transactional scope.
///
/// `P` is the resource's physical transaction handle and `S` its suspended
/// handle. Only owning frames (`is_new`) carry a physical handle.
#[derive(Debug)]
pub struct TransactionFrame<P, S> {
    pub(crate) id: FrameId,
    pub(crate) is_new: bool,
    pub(crate) rollback_only: bool,
    pub(crate) parent: Option<FrameId>,
    pub(crate) physical: Option<P>,
    pub(crate) suspended: Option<S>,
}

impl<P, S> TransactionFrame<P, S> {
    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }
}

/// Snapshot of a frame as seen by its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStatus {
    pub id: FrameId,
    /// The frame opened the physical transaction it runs in.
    pub is_new: bool,
    /// The owning physical transaction has been marked rollback-only.
    pub rollback_only: bool,
    /// 1 for the outermost frame.
    pub depth: usize,
}
