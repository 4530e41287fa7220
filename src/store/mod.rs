//! Storage seams of the ledger.
//!
//! Each component (directory, balances, requests, sessions) is a trait over a
//! unit of work. A [`LedgerTx`] implements all of them and is either committed as
//! a whole or dropped, in which case none of its writes become visible.

use async_trait::async_trait;

use crate::error::LedgerError;

pub mod balance;
pub mod directory;
pub mod memory;
pub mod mysql;
pub mod request;
pub mod session;

pub use balance::BalanceStore;
pub use directory::{EmployeeDirectory, authorize};
pub use memory::MemoryStore;
pub use mysql::MySqlStore;
pub use request::RequestStore;
pub use session::SessionStore;

#[async_trait]
pub trait LedgerTx: EmployeeDirectory + BalanceStore + RequestStore + SessionStore {
    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError>;

    /// A unit of work that only reads. Backends may run these concurrently with
    /// each other; writing through one is an error.
    async fn begin_read(&self) -> Result<Box<dyn LedgerTx>, LedgerError> {
        self.begin().await
    }
}
