use std::ops::DerefMut;

use sqlx::{MySql, MySqlConnection, MySqlPool, Transaction};
use tracing::trace;

use crate::error::{Error, Result};
use crate::resource::{BoxFuture, Resource};

/// Identifier of a physical transaction opened by a [`MySqlResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MySqlTxId(u64);

struct BoundTx {
    id: MySqlTxId,
    tx: Transaction<'static, MySql>,
}

/// A parked SQLx transaction. Dropping it rolls the transaction back.
pub struct SuspendedMySqlTx(BoundTx);

/// [`Resource`] backed by a MySQL connection pool.
///
/// Each physical transaction holds its own pooled connection, so a suspended
/// transaction keeps its connection while an independent one runs.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx::MySqlPool;
/// use sqlx_tx_propagation::{MySqlResource, Propagation, TransactionManager};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = MySqlPool::connect("mysql://localhost/test").await?;
/// let mut tx = TransactionManager::new(MySqlResource::new(pool));
///
/// let frame = tx.begin(Propagation::Required).await?;
/// sqlx::query("INSERT INTO member (username) VALUES (?)")
///     .bind("Alice")
///     .execute(tx.resource_mut().executor()?)
///     .await?;
/// tx.commit(frame).await?;
/// # Ok(())
/// # }
/// ```
pub struct MySqlResource {
    pool: MySqlPool,
    bound: Option<BoundTx>,
    next_tx: u64,
}

impl MySqlResource {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            bound: None,
            next_tx: 0,
        }
    }

    /// Returns the connection of the bound transaction for use as an Executor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveTransaction`] if no transaction is bound.
    pub fn executor(&mut self) -> Result<&mut MySqlConnection> {
        self.bound
            .as_mut()
            .map(|bound| bound.tx.deref_mut())
            .ok_or(Error::NoActiveTransaction)
    }

    /// Returns `true` while a physical transaction is bound.
    pub fn in_transaction(&self) -> bool {
        self.bound.is_some()
    }

    fn take_bound(&mut self, physical: MySqlTxId) -> Result<Transaction<'static, MySql>> {
        match self.bound.take() {
            Some(bound) if bound.id == physical => Ok(bound.tx),
            Some(bound) => {
                let found = bound.id;
                self.bound = Some(bound);
                Err(Error::ContextCorrupted(format!(
                    "transaction {physical:?} is not bound (bound: {found:?})"
                )))
            }
            None => Err(Error::NoActiveTransaction),
        }
    }
}

impl Resource for MySqlResource {
    type Physical = MySqlTxId;
    type Suspended = SuspendedMySqlTx;

    fn begin(&mut self) -> BoxFuture<'_, Result<MySqlTxId>> {
        Box::pin(async move {
            if let Some(bound) = &self.bound {
                return Err(Error::ContextCorrupted(format!(
                    "transaction {:?} is still bound",
                    bound.id
                )));
            }
            let tx = self.pool.begin().await?;
            self.next_tx += 1;
            let id = MySqlTxId(self.next_tx);
            self.bound = Some(BoundTx { id, tx });
            trace!(tx = id.0, "mysql transaction begun");
            Ok(id)
        })
    }

    fn commit(&mut self, physical: MySqlTxId) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.take_bound(physical)?.commit().await?;
            trace!(tx = physical.0, "mysql transaction committed");
            Ok(())
        })
    }

    fn rollback(&mut self, physical: MySqlTxId) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.take_bound(physical)?.rollback().await?;
            trace!(tx = physical.0, "mysql transaction rolled back");
            Ok(())
        })
    }

    fn suspend(&mut self) -> Result<SuspendedMySqlTx> {
        self.bound
            .take()
            .map(SuspendedMySqlTx)
            .ok_or(Error::NoActiveTransaction)
    }

    fn resume(&mut self, suspended: SuspendedMySqlTx) -> Result<()> {
        if let Some(bound) = &self.bound {
            return Err(Error::ContextCorrupted(format!(
                "cannot resume {:?} while {:?} is bound",
                suspended.0.id, bound.id
            )));
        }
        self.bound = Some(suspended.0);
        Ok(())
    }
}
