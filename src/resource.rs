use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

/// Future returned by the asynchronous [`Resource`] primitives.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A participant able to run physical transactions for the manager.
///
/// A resource binds at most one physical transaction at a time. `begin`
/// opens and binds one; `suspend` detaches the bound one into a handle and
/// `resume` re-attaches it. The manager only sequences these calls; it never
/// looks at what the resource stores.
pub trait Resource: Send {
    /// Handle of an open physical transaction.
    type Physical: Send;
    /// Handle of a detached (parked) physical transaction.
    type Suspended: Send;

    /// Opens a new physical transaction and binds it.
    fn begin(&mut self) -> BoxFuture<'_, Result<Self::Physical>>;

    /// Commits the bound physical transaction `physical` and unbinds it.
    fn commit(&mut self, physical: Self::Physical) -> BoxFuture<'_, Result<()>>;

    /// Rolls back the bound physical transaction `physical` and unbinds it.
    fn rollback(&mut self, physical: Self::Physical) -> BoxFuture<'_, Result<()>>;

    /// Detaches the bound physical transaction.
    fn suspend(&mut self) -> Result<Self::Suspended>;

    /// Re-attaches a transaction previously returned by [`Resource::suspend`].
    fn resume(&mut self, suspended: Self::Suspended) -> Result<()>;
}
