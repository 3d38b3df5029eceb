use super::error::Error;
use super::manager::TransactionManager;
use super::propagation::Propagation;
use super::resource::Resource;
use std::future::Future;
use std::pin::Pin;
use tracing::warn;

/// Executes a function within a transaction frame, using anyhow::Error for error handling.
///
/// This is a convenience wrapper around [`with_transaction`](crate::with_transaction)
/// for closures returning `anyhow::Result<T>`. Manager errors such as
/// [`Error::UnexpectedRollback`](crate::Error::UnexpectedRollback) are converted
/// into `anyhow::Error` and can be recovered with `downcast_ref`.
///
/// # Examples
///
/// ```rust
/// use sqlx_tx_propagation::{
///     with_transaction_anyhow, MemoryResource, Propagation, TransactionManager,
/// };
///
/// # async fn example() -> anyhow::Result<()> {
/// let mut tx = TransactionManager::new(MemoryResource::new());
/// with_transaction_anyhow(&mut tx, Propagation::Required, |tx| {
///     Box::pin(async move {
///         tx.resource_mut().insert("member", "alice", "alice");
///         Ok(())
///     })
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_transaction_anyhow<R, F, T>(
    tx: &mut TransactionManager<R>,
    propagation: Propagation,
    f: F,
) -> anyhow::Result<T>
where
    R: Resource,
    F: for<'a> FnOnce(
        &'a mut TransactionManager<R>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>,
    T: Send,
{
    let frame = tx.begin(propagation).await?;

    match f(tx).await {
        Ok(result) => match tx.commit(frame).await {
            Ok(()) => Ok(result),
            Err(err @ Error::FrameOrdering { .. }) if tx.is_open(frame) => {
                warn!(frame = %frame.id(), "scope returned with inner frames open, rolling back");
                if let Err(unwind_err) = tx.unwind(frame).await {
                    warn!(frame = %frame.id(), error = %unwind_err, "rollback of abandoned frames failed");
                }
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        },
        Err(e) => {
            if let Err(rollback_err) = tx.unwind(frame).await {
                warn!(frame = %frame.id(), error = %rollback_err, "rollback after failure also failed");
            }
            Err(e)
        }
    }
}
