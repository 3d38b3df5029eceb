use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use crate::error::Error;
use crate::manager::TransactionManager;
use crate::propagation::Propagation;
use crate::resource::Resource;

/// Executes a function within a transaction frame.
///
/// This function handles the frame lifecycle automatically:
/// - Begins a frame with the requested propagation
/// - Executes the provided function
/// - Commits on success
/// - Rolls back on error and returns the original error
/// - Rolls back frames `f` began but left open, then fails with
///   [`Error::FrameOrdering`](crate::Error::FrameOrdering)
///
/// When the frame joins an outer transaction, rolling back only marks that
/// transaction rollback-only. A caller that swallows the error and returns
/// normally will see [`Error::UnexpectedRollback`](crate::Error::UnexpectedRollback)
/// from the outermost `with_transaction`.
///
/// # Type Parameters
///
/// * `R` - The resource participants write through
/// * `F` - A function that takes the manager and returns a pinned future
/// * `T` - The return type of the function (must be `Send`)
///
/// # Examples
///
/// ## Joined scopes
///
/// ```rust
/// use sqlx_tx_propagation::{with_transaction, MemoryResource, Propagation, TransactionManager};
///
/// # async fn example() -> sqlx_tx_propagation::Result<()> {
/// let mut tx = TransactionManager::new(MemoryResource::new());
///
/// with_transaction(&mut tx, Propagation::Required, |tx| {
///     Box::pin(async move {
///         tx.resource_mut().insert("member", "alice", "alice");
///
///         with_transaction(tx, Propagation::Required, |tx| {
///             Box::pin(async move {
///                 tx.resource_mut().insert("log", "alice", "joined");
///                 Ok(())
///             })
///         })
///         .await
///     })
/// })
/// .await?;
///
/// assert_eq!(tx.resource().find_committed("log", "alice"), Some("joined"));
/// # Ok(())
/// # }
/// ```
///
/// ## Independent logging
///
/// ```rust
/// use sqlx_tx_propagation::{
///     with_transaction, Error, MemoryResource, Propagation, TransactionManager,
/// };
///
/// # async fn example() -> sqlx_tx_propagation::Result<()> {
/// let mut tx = TransactionManager::new(MemoryResource::new());
///
/// with_transaction(&mut tx, Propagation::Required, |tx| {
///     Box::pin(async move {
///         tx.resource_mut().insert("member", "bob", "bob");
///
///         // The log write fails in its own transaction; the member survives.
///         let logged: Result<(), Error> =
///             with_transaction(tx, Propagation::RequiresNew, |tx| {
///                 Box::pin(async move {
///                     tx.resource_mut().insert("log", "bob", "joined");
///                     Err(Error::participant("log storage unavailable"))
///                 })
///             })
///             .await;
///         assert!(logged.is_err());
///         Ok(())
///     })
/// })
/// .await?;
///
/// assert_eq!(tx.resource().find_committed("member", "bob"), Some("bob"));
/// assert_eq!(tx.resource().find_committed("log", "bob"), None);
/// # Ok(())
/// # }
/// ```
pub async fn with_transaction<R, F, T>(
    tx: &mut TransactionManager<R>,
    propagation: Propagation,
    f: F,
) -> crate::Result<T>
where
    R: Resource,
    F: for<'a> FnOnce(
        &'a mut TransactionManager<R>,
    ) -> Pin<Box<dyn Future<Output = crate::Result<T>> + Send + 'a>>,
    T: Send,
{
    let frame = tx.begin(propagation).await?;

    match f(tx).await {
        Ok(result) => match tx.commit(frame).await {
            Ok(()) => Ok(result),
            // Inner frames left open by `f`: nothing below them can be completed
            Err(err @ Error::FrameOrdering { .. }) if tx.is_open(frame) => {
                warn!(frame = %frame.id(), "scope returned with inner frames open, rolling back");
                if let Err(unwind_err) = tx.unwind(frame).await {
                    warn!(frame = %frame.id(), error = %unwind_err, "rollback of abandoned frames failed");
                }
                Err(err)
            }
            Err(err) => Err(err),
        },
        Err(e) => {
            // The original error wins over a failing rollback
            if let Err(rollback_err) = tx.unwind(frame).await {
                warn!(frame = %frame.id(), error = %rollback_err, "rollback after failure also failed");
            }
            Err(e)
        }
    }
}
