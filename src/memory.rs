use std::collections::BTreeMap;

use tracing::trace;

use crate::error::{Error, Result};
use crate::resource::{BoxFuture, Resource};

type Table = BTreeMap<String, String>;

/// Identifier of a physical transaction opened by a [`MemoryResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryTxId(u64);

/// A parked [`MemoryResource`] transaction and its uncommitted writes.
#[derive(Debug)]
pub struct SuspendedMemoryTx(PendingTx);

#[derive(Debug)]
struct PendingTx {
    id: MemoryTxId,
    writes: BTreeMap<String, Table>,
}

/// Counters of the physical operations a [`MemoryResource`] has performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub begun: u64,
    pub committed: u64,
    pub rolled_back: u64,
    pub suspended: u64,
    pub resumed: u64,
}

/// In-memory table store implementing [`Resource`].
///
/// Writes made while a transaction is bound are buffered in that
/// transaction's write set and only reach the committed tables on commit.
/// Writes with nothing bound are applied immediately.
#[derive(Debug, Default)]
pub struct MemoryResource {
    committed: BTreeMap<String, Table>,
    bound: Option<PendingTx>,
    next_tx: u64,
    stats: MemoryStats,
}

impl MemoryResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a row through the bound transaction, or directly if none is bound.
    pub fn insert(&mut self, table: &str, key: impl Into<String>, value: impl Into<String>) {
        let target = match self.bound.as_mut() {
            Some(tx) => &mut tx.writes,
            None => &mut self.committed,
        };
        target
            .entry(table.to_string())
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Reads a row as seen by the bound transaction (its own writes first).
    pub fn find(&self, table: &str, key: &str) -> Option<&str> {
        self.bound
            .as_ref()
            .and_then(|tx| tx.writes.get(table))
            .and_then(|rows| rows.get(key))
            .or_else(|| self.committed.get(table).and_then(|rows| rows.get(key)))
            .map(String::as_str)
    }

    /// Reads a row from the committed tables only.
    pub fn find_committed(&self, table: &str, key: &str) -> Option<&str> {
        self.committed
            .get(table)
            .and_then(|rows| rows.get(key))
            .map(String::as_str)
    }

    pub fn len_committed(&self, table: &str) -> usize {
        self.committed.get(table).map_or(0, BTreeMap::len)
    }

    /// Returns `true` while a physical transaction is bound.
    pub fn in_transaction(&self) -> bool {
        self.bound.is_some()
    }

    pub fn stats(&self) -> MemoryStats {
        self.stats
    }

    fn take_bound(&mut self, physical: MemoryTxId) -> Result<PendingTx> {
        match self.bound.take() {
            Some(tx) if tx.id == physical => Ok(tx),
            Some(tx) => {
                let found = tx.id;
                self.bound = Some(tx);
                Err(Error::ContextCorrupted(format!(
                    "transaction {physical:?} is not bound (bound: {found:?})"
                )))
            }
            None => Err(Error::NoActiveTransaction),
        }
    }
}

impl Resource for MemoryResource {
    type Physical = MemoryTxId;
    type Suspended = SuspendedMemoryTx;

    fn begin(&mut self) -> BoxFuture<'_, Result<MemoryTxId>> {
        Box::pin(async move {
            if let Some(tx) = &self.bound {
                return Err(Error::ContextCorrupted(format!(
                    "transaction {:?} is still bound",
                    tx.id
                )));
            }
            self.next_tx += 1;
            let id = MemoryTxId(self.next_tx);
            self.bound = Some(PendingTx {
                id,
                writes: BTreeMap::new(),
            });
            self.stats.begun += 1;
            trace!(tx = id.0, "memory transaction begun");
            Ok(id)
        })
    }

    fn commit(&mut self, physical: MemoryTxId) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let tx = self.take_bound(physical)?;
            for (table, rows) in tx.writes {
                self.committed.entry(table).or_default().extend(rows);
            }
            self.stats.committed += 1;
            trace!(tx = physical.0, "memory transaction committed");
            Ok(())
        })
    }

    fn rollback(&mut self, physical: MemoryTxId) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.take_bound(physical)?;
            self.stats.rolled_back += 1;
            trace!(tx = physical.0, "memory transaction rolled back");
            Ok(())
        })
    }

    fn suspend(&mut self) -> Result<SuspendedMemoryTx> {
        let tx = self.bound.take().ok_or(Error::NoActiveTransaction)?;
        self.stats.suspended += 1;
        Ok(SuspendedMemoryTx(tx))
    }

    fn resume(&mut self, suspended: SuspendedMemoryTx) -> Result<()> {
        if let Some(tx) = &self.bound {
            return Err(Error::ContextCorrupted(format!(
                "cannot resume {:?} while {:?} is bound",
                suspended.0.id, tx.id
            )));
        }
        self.bound = Some(suspended.0);
        self.stats.resumed += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_are_buffered_until_commit() {
        let mut res = MemoryResource::new();
        let tx = res.begin().await.unwrap();
        res.insert("member", "alice", "alice");

        assert_eq!(res.find("member", "alice"), Some("alice"));
        assert_eq!(res.find_committed("member", "alice"), None);

        res.commit(tx).await.unwrap();
        assert_eq!(res.find_committed("member", "alice"), Some("alice"));
        assert!(!res.in_transaction());
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let mut res = MemoryResource::new();
        let tx = res.begin().await.unwrap();
        res.insert("log", "bob", "joined");
        res.rollback(tx).await.unwrap();

        assert_eq!(res.find("log", "bob"), None);
        assert_eq!(res.len_committed("log"), 0);
        assert_eq!(res.stats().rolled_back, 1);
    }

    #[tokio::test]
    async fn suspended_writes_are_hidden_until_resumed() {
        let mut res = MemoryResource::new();
        let outer = res.begin().await.unwrap();
        res.insert("member", "carol", "carol");

        let parked = res.suspend().unwrap();
        assert_eq!(res.find("member", "carol"), None);

        let inner = res.begin().await.unwrap();
        res.insert("log", "carol", "joined");
        res.commit(inner).await.unwrap();

        res.resume(parked).unwrap();
        assert_eq!(res.find("member", "carol"), Some("carol"));
        res.rollback(outer).await.unwrap();

        assert_eq!(res.find_committed("member", "carol"), None);
        assert_eq!(res.find_committed("log", "carol"), Some("joined"));
    }

    #[tokio::test]
    async fn wrong_handle_is_rejected_and_binding_kept() {
        let mut res = MemoryResource::new();
        let first = res.begin().await.unwrap();
        let parked = res.suspend().unwrap();
        let second = res.begin().await.unwrap();

        assert!(matches!(res.commit(first).await, Err(Error::ContextCorrupted(_))));
        assert!(res.in_transaction());
        assert!(matches!(res.resume(parked), Err(Error::ContextCorrupted(_))));

        res.rollback(second).await.unwrap();
        assert!(matches!(res.commit(second).await, Err(Error::NoActiveTransaction)));
    }

    #[test]
    fn writes_without_transaction_auto_commit() {
        let mut res = MemoryResource::new();
        res.insert("member", "dave", "dave");
        assert_eq!(res.find_committed("member", "dave"), Some("dave"));
    }
}
