//! # sqlx-tx-propagation
//!
//! A local transaction manager with propagation semantics for SQLx.
//!
//! ## Features
//!
//! - **Propagation**: `Required` joins the caller's transaction, `RequiresNew`
//!   suspends it and runs an independent one
//! - **Rollback-only tracking**: a failing joined scope dooms the whole physical
//!   transaction; the owner's commit reports it as [`Error::UnexpectedRollback`]
//! - **Single owner decides**: only the frame that opened a physical transaction
//!   ever commits or rolls it back
//! - **Explicit context**: the frame stack lives in a [`TransactionManager`]
//!   passed down the call chain, never in a global
//! - **Pluggable resources**: [`MySqlResource`] for MySQL via SQLx,
//!   [`MemoryResource`] for in-memory tables
//!
//! ## Quick Start
//!
//! ```rust
//! use sqlx_tx_propagation::{with_transaction, MemoryResource, Propagation, TransactionManager};
//!
//! # async fn example() -> sqlx_tx_propagation::Result<()> {
//! let mut tx = TransactionManager::new(MemoryResource::new());
//!
//! with_transaction(&mut tx, Propagation::Required, |tx| {
//!     Box::pin(async move {
//!         tx.resource_mut().insert("member", "alice", "alice");
//!         Ok(())
//!     })
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Caught failures
//!
//! Swallowing a joined scope's failure does not save the transaction:
//!
//! ```rust
//! use sqlx_tx_propagation::{with_transaction, Error, MemoryResource, Propagation, TransactionManager};
//!
//! # async fn example() {
//! let mut tx = TransactionManager::new(MemoryResource::new());
//!
//! let result = with_transaction(&mut tx, Propagation::Required, |tx| {
//!     Box::pin(async move {
//!         tx.resource_mut().insert("member", "bob", "bob");
//!
//!         let _ = with_transaction(tx, Propagation::Required, |_tx| {
//!             Box::pin(async move { Err::<(), _>(Error::participant("log failed")) })
//!         })
//!         .await; // swallowed
//!
//!         Ok(())
//!     })
//! })
//! .await;
//!
//! assert!(matches!(result, Err(Error::UnexpectedRollback { .. })));
//! assert_eq!(tx.resource().find_committed("member", "bob"), None);
//! # }
//! ```
//!
//! Run the failing scope with [`Propagation::RequiresNew`] instead and the
//! outer transaction commits.
//!
//! ## Manual Control
//!
//! [`TransactionManager::begin`], [`commit`](TransactionManager::commit) and
//! [`rollback`](TransactionManager::rollback) can be called directly; frames
//! must be completed in LIFO order.
//!
//! ## License
//!
//! Licensed under either of Apache License, Version 2.0 or MIT license at your option.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod frame;
pub mod manager;
pub mod memory;
pub mod mysql;
pub mod propagation;
pub mod resource;

#[cfg(feature = "anyhow")]
pub mod anyhow_compat;

pub use config::ManagerConfig;
pub use context::TransactionContext;
pub use error::{Error, Result};
pub use executor::with_transaction;
pub use frame::{FrameHandle, FrameId, FrameStatus, TransactionFrame};
pub use manager::TransactionManager;
pub use memory::MemoryResource;
pub use mysql::MySqlResource;
pub use propagation::{classify, FrameDecision, Propagation};
pub use resource::{BoxFuture, Resource};

#[cfg(feature = "anyhow")]
pub use anyhow_compat::with_transaction_anyhow;

/// Convenience re-exports for common use cases
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::executor::with_transaction;
    pub use crate::manager::TransactionManager;
    pub use crate::propagation::Propagation;
    pub use crate::resource::Resource;
}
