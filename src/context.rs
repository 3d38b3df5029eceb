use crate::error::{Error, Result};
use crate::frame::{FrameHandle, FrameId, TransactionFrame};

/// Execution-scoped stack of transaction frames.
///
/// A context belongs to exactly one task or thread and is passed explicitly
/// (through the [`TransactionManager`](crate::TransactionManager) that owns it),
/// never stored in a global. The top of the stack is the most recently begun
/// frame; frames are only ever removed from the top.
#[derive(Debug)]
pub struct TransactionContext<P, S> {
    stack: Vec<TransactionFrame<P, S>>,
    next_id: u64,
}

impl<P, S> Default for TransactionContext<P, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, S> TransactionContext<P, S> {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            next_id: 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn top(&self) -> Option<&TransactionFrame<P, S>> {
        self.stack.last()
    }

    /// Pushes a new frame on top of the stack and returns its handle.
    pub(crate) fn push(
        &mut self,
        is_new: bool,
        physical: Option<P>,
        suspended: Option<S>,
    ) -> FrameHandle {
        let id = FrameId(self.next_id);
        self.next_id += 1;
        let parent = self.stack.last().map(|frame| frame.id);
        self.stack.push(TransactionFrame {
            id,
            is_new,
            rollback_only: false,
            parent,
            physical,
            suspended,
        });
        FrameHandle { id }
    }

    /// Fails with [`Error::FrameOrdering`] unless `handle` is the top frame.
    pub(crate) fn ensure_top(&self, handle: FrameHandle) -> Result<()> {
        let top = self.stack.last().map(|frame| frame.id);
        if top == Some(handle.id) {
            Ok(())
        } else {
            Err(Error::FrameOrdering {
                frame: handle.id,
                top,
            })
        }
    }

    /// Removes the top frame, which must be `handle`.
    pub(crate) fn pop(&mut self, handle: FrameHandle) -> Result<TransactionFrame<P, S>> {
        self.ensure_top(handle)?;
        self.stack
            .pop()
            .ok_or_else(|| Error::ContextCorrupted("pop on empty stack".to_string()))
    }

    pub(crate) fn position(&self, handle: FrameHandle) -> Option<usize> {
        self.stack.iter().position(|frame| frame.id == handle.id)
    }

    /// Index of the frame owning the physical transaction the frame at `index` runs in.
    pub(crate) fn owner_index(&self, index: usize) -> Option<usize> {
        self.stack[..=index].iter().rposition(|frame| frame.is_new)
    }

    /// The owning frame of the currently active physical transaction.
    pub fn active_owner(&self) -> Option<&TransactionFrame<P, S>> {
        self.stack.iter().rev().find(|frame| frame.is_new)
    }

    pub(crate) fn active_owner_mut(&mut self) -> Option<&mut TransactionFrame<P, S>> {
        self.stack.iter_mut().rev().find(|frame| frame.is_new)
    }

    pub(crate) fn frame(&self, index: usize) -> &TransactionFrame<P, S> {
        &self.stack[index]
    }

    pub(crate) fn frame_mut(&mut self, index: usize) -> &mut TransactionFrame<P, S> {
        &mut self.stack[index]
    }

    /// Checks the structural invariants of the stack.
    ///
    /// The root frame must own a physical transaction, each frame's parent
    /// link must point at the frame below it, and every owning frame must
    /// hold a physical handle.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(root) = self.stack.first() {
            if !root.is_new {
                return Err(Error::ContextCorrupted(format!(
                    "root frame {} does not own a physical transaction",
                    root.id
                )));
            }
        }
        for (index, frame) in self.stack.iter().enumerate() {
            let expected = index.checked_sub(1).map(|below| self.stack[below].id);
            if frame.parent != expected {
                return Err(Error::ContextCorrupted(format!(
                    "frame {} has parent {:?}, expected {:?}",
                    frame.id, frame.parent, expected
                )));
            }
            if frame.is_new != frame.physical.is_some() {
                return Err(Error::ContextCorrupted(format!(
                    "frame {} ownership does not match its physical handle",
                    frame.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Ctx = TransactionContext<u32, u32>;

    #[test]
    fn push_links_parents_and_assigns_unique_ids() {
        let mut ctx = Ctx::new();
        let root = ctx.push(true, Some(1), None);
        let joined = ctx.push(false, None, None);

        assert_ne!(root.id(), joined.id());
        assert_eq!(ctx.depth(), 2);
        assert_eq!(ctx.top().map(|frame| frame.parent()), Some(Some(root.id())));
        assert!(ctx.validate().is_ok());
    }

    #[test]
    fn pop_requires_top_frame() {
        let mut ctx = Ctx::new();
        let root = ctx.push(true, Some(1), None);
        let inner = ctx.push(false, None, None);

        assert!(matches!(
            ctx.pop(root),
            Err(Error::FrameOrdering { top: Some(top), .. }) if top == inner.id()
        ));
        assert!(ctx.pop(inner).is_ok());
        assert!(ctx.pop(root).is_ok());
        assert!(ctx.is_empty());
        assert!(matches!(ctx.pop(root), Err(Error::FrameOrdering { top: None, .. })));
    }

    #[test]
    fn active_owner_skips_joined_frames() {
        let mut ctx = Ctx::new();
        let outer = ctx.push(true, Some(1), None);
        ctx.push(false, None, None);
        let independent = ctx.push(true, Some(2), Some(1));
        ctx.push(false, None, None);

        assert_eq!(ctx.active_owner().map(|frame| frame.id()), Some(independent.id()));
        assert_eq!(ctx.owner_index(1), Some(0));
        assert_eq!(ctx.frame(ctx.owner_index(3).unwrap()).id(), independent.id());
        assert_eq!(ctx.frame(0).id(), outer.id());
    }

    #[test]
    fn validate_rejects_joined_root() {
        let mut ctx = Ctx::new();
        ctx.push(false, None, None);
        assert!(matches!(ctx.validate(), Err(Error::ContextCorrupted(_))));
    }
}
