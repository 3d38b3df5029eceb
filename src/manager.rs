use tracing::{debug, warn};

use crate::config::ManagerConfig;
use crate::context::TransactionContext;
use crate::error::{Error, Result};
use crate::frame::{FrameHandle, FrameStatus, TransactionFrame};
use crate::propagation::{classify, Propagation};
use crate::resource::Resource;

type Frame<R> = TransactionFrame<<R as Resource>::Physical, <R as Resource>::Suspended>;

/// Propagation-aware transaction manager for one execution unit.
///
/// The manager owns the frame stack of its task and the [`Resource`] the
/// task's participants write through. Pass `&mut TransactionManager` down the
/// call chain; every nested scope calls [`begin`](Self::begin) and then exactly
/// one of [`commit`](Self::commit) or [`rollback`](Self::rollback), in LIFO order.
///
/// Only the frame that opened a physical transaction ever commits or rolls it
/// back. A joined frame that rolls back only marks its owner rollback-only; the
/// owner's `commit` then rolls back and fails with [`Error::UnexpectedRollback`].
///
/// # Examples
///
/// ```rust
/// use sqlx_tx_propagation::{MemoryResource, Propagation, TransactionManager};
///
/// # async fn example() -> sqlx_tx_propagation::Result<()> {
/// let mut tx = TransactionManager::new(MemoryResource::new());
///
/// let outer = tx.begin(Propagation::Required).await?;
/// tx.resource_mut().insert("member", "alice", "alice");
///
/// let inner = tx.begin(Propagation::Required).await?;
/// tx.rollback(inner).await?; // joined: marks the outer transaction
///
/// assert!(tx.commit(outer).await.unwrap_err().is_unexpected_rollback());
/// assert_eq!(tx.resource().find_committed("member", "alice"), None);
/// # Ok(())
/// # }
/// ```
pub struct TransactionManager<R: Resource> {
    resource: R,
    context: TransactionContext<R::Physical, R::Suspended>,
    config: ManagerConfig,
}

impl<R: Resource> TransactionManager<R> {
    pub fn new(resource: R) -> Self {
        Self::with_config(resource, ManagerConfig::default())
    }

    pub fn with_config(resource: R, config: ManagerConfig) -> Self {
        Self {
            resource,
            context: TransactionContext::new(),
            config,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// The resource participants read and write through.
    pub fn resource_mut(&mut self) -> &mut R {
        &mut self.resource
    }

    pub fn context(&self) -> &TransactionContext<R::Physical, R::Suspended> {
        &self.context
    }

    /// Returns `true` while any frame is open.
    pub fn is_active(&self) -> bool {
        !self.context.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.context.depth()
    }

    /// Begins a new frame with the given propagation.
    ///
    /// A new physical transaction is opened only when the frame owns one; for
    /// [`Propagation::RequiresNew`] inside an active transaction, the active
    /// one is suspended first and resumed when the new frame completes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContextCorrupted`] if the frame stack is inconsistent,
    /// or any error raised by the resource while suspending or beginning.
    pub async fn begin(&mut self, propagation: Propagation) -> Result<FrameHandle> {
        self.context.validate()?;
        let decision = classify(propagation, &self.context);

        let suspended = if decision.suspend {
            Some(self.resource.suspend()?)
        } else {
            None
        };

        let physical = if decision.is_new {
            match self.resource.begin().await {
                Ok(physical) => Some(physical),
                Err(err) => {
                    if let Some(suspended) = suspended {
                        if let Err(resume_err) = self.resource.resume(suspended) {
                            warn!(error = %resume_err, "failed to resume suspended transaction after begin failure");
                        }
                    }
                    return Err(err);
                }
            }
        } else {
            None
        };

        let handle = self.context.push(decision.is_new, physical, suspended);
        debug!(
            frame = %handle.id(),
            %propagation,
            is_new = decision.is_new,
            suspended = decision.suspend,
            depth = self.context.depth(),
            "transaction frame begun"
        );
        Ok(handle)
    }

    /// Completes the top frame successfully.
    ///
    /// For an owning frame this physically commits, unless the transaction was
    /// marked rollback-only: then it is rolled back and
    /// [`Error::UnexpectedRollback`] is returned. A joined frame is just popped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameOrdering`] if `handle` is not the top frame
    /// (including a handle that was already completed).
    pub async fn commit(&mut self, handle: FrameHandle) -> Result<()> {
        let frame = self.context.pop(handle)?;

        if !frame.is_new {
            debug!(frame = %frame.id, depth = self.context.depth(), "participating frame completed");
            if self.config.fail_early_on_global_rollback_only && self.owner_rollback_only() {
                warn!(frame = %frame.id, "participating frame committed into a rollback-only transaction");
                return Err(Error::UnexpectedRollback { frame: frame.id });
            }
            return Ok(());
        }

        if frame.rollback_only {
            let id = frame.id;
            warn!(frame = %id, "commit requested on rollback-only transaction, rolling back");
            self.complete(frame, false).await?;
            return Err(Error::UnexpectedRollback { frame: id });
        }

        self.complete(frame, true).await
    }

    /// Completes the top frame unsuccessfully.
    ///
    /// An owning frame physically rolls back. A joined frame does nothing
    /// physical; it marks the nearest owning frame rollback-only (unless
    /// disabled through [`ManagerConfig`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameOrdering`] if `handle` is not the top frame.
    pub async fn rollback(&mut self, handle: FrameHandle) -> Result<()> {
        let frame = self.context.pop(handle)?;

        if frame.is_new {
            return self.complete(frame, false).await;
        }

        if self.config.global_rollback_on_participation_failure {
            let owner = self.context.active_owner_mut().ok_or_else(|| {
                Error::ContextCorrupted(format!("joined frame {} has no owning frame", frame.id))
            })?;
            owner.rollback_only = true;
            debug!(frame = %frame.id, owner = %owner.id, "participating frame failed, marking transaction rollback-only");
        } else {
            debug!(frame = %frame.id, "participating frame failed, leaving transaction untouched");
        }
        Ok(())
    }

    /// Marks the physical transaction `handle` runs in as rollback-only,
    /// without completing the frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameOrdering`] if `handle` is not an open frame.
    pub fn mark_rollback_only(&mut self, handle: FrameHandle) -> Result<()> {
        let owner = self.owner_index(handle)?;
        let owner = self.context.frame_mut(owner);
        owner.rollback_only = true;
        debug!(frame = %handle.id(), owner = %owner.id, "transaction marked rollback-only");
        Ok(())
    }

    /// Describes an open frame.
    pub fn status(&self, handle: FrameHandle) -> Result<FrameStatus> {
        let position = self.position(handle)?;
        let owner = self.owner_index(handle)?;
        let frame = self.context.frame(position);
        Ok(FrameStatus {
            id: frame.id,
            is_new: frame.is_new,
            rollback_only: self.context.frame(owner).rollback_only,
            depth: position + 1,
        })
    }

    pub fn is_rollback_only(&self, handle: FrameHandle) -> Result<bool> {
        self.status(handle).map(|status| status.rollback_only)
    }

    /// Returns `true` while `handle` is still on the stack.
    pub fn is_open(&self, handle: FrameHandle) -> bool {
        self.context.position(handle).is_some()
    }

    /// Rolls back every frame above `handle`, then `handle` itself.
    ///
    /// Used when a scope fails or returns with inner frames left open. Every
    /// frame is popped even if a physical rollback fails; the first error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameOrdering`] if `handle` is not an open frame.
    pub async fn unwind(&mut self, handle: FrameHandle) -> Result<()> {
        self.position(handle)?;
        let mut first_err = None;
        while let Some(top) = self.context.top().map(|frame| FrameHandle { id: frame.id }) {
            if top != handle {
                warn!(frame = %top.id(), "rolling back frame left open by its scope");
            }
            if let Err(err) = self.rollback(top).await {
                first_err.get_or_insert(err);
            }
            if top == handle {
                break;
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn position(&self, handle: FrameHandle) -> Result<usize> {
        self.context
            .position(handle)
            .ok_or_else(|| Error::FrameOrdering {
                frame: handle.id(),
                top: self.context.top().map(|frame| frame.id),
            })
    }

    fn owner_index(&self, handle: FrameHandle) -> Result<usize> {
        let position = self.position(handle)?;
        self.context.owner_index(position).ok_or_else(|| {
            Error::ContextCorrupted(format!("frame {} has no owning frame", handle.id()))
        })
    }

    fn owner_rollback_only(&self) -> bool {
        self.context
            .active_owner()
            .is_some_and(|owner| owner.rollback_only)
    }

    /// Finalizes the physical transaction of a popped owning frame and
    /// resumes whatever it suspended, even if finalizing failed.
    async fn complete(&mut self, frame: Frame<R>, commit: bool) -> Result<()> {
        let TransactionFrame {
            id,
            physical,
            suspended,
            ..
        } = frame;

        let outcome = match physical {
            Some(physical) if commit => self.resource.commit(physical).await,
            Some(physical) => self.resource.rollback(physical).await,
            None => Err(Error::ContextCorrupted(format!(
                "frame {id} owns no physical transaction"
            ))),
        };
        debug!(frame = %id, commit, ok = outcome.is_ok(), "physical transaction completed");

        let resumed = match suspended {
            Some(suspended) => {
                let resumed = self.resource.resume(suspended);
                debug!(frame = %id, ok = resumed.is_ok(), "suspended transaction resumed");
                resumed
            }
            None => Ok(()),
        };

        outcome.and(resumed)
    }
}

impl<R: Resource> Drop for TransactionManager<R> {
    /// Open frames at drop time are a caller bug; the resource's own drop
    /// semantics decide what happens to the bound transaction.
    fn drop(&mut self) {
        if self.is_active() {
            warn!(
                open_frames = self.context.depth(),
                "transaction manager dropped with open frames"
            );
        }
    }
}
