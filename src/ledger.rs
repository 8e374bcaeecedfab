//! Read-only view of the authoritative invitation list.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::field::{from_bytes32, to_bytes32, Field};

/// Sequential, append-only, globally ordered list of committed invitation
/// leaves plus a running count.
///
/// Stands in for the on-chain contract; the client only ever polls it
/// during sync. All methods are fallible because real implementations sit
/// behind a network.
pub trait LedgerSource {
    /// Configured depth of the on-chain tree.
    fn levels(&self) -> Result<usize>;

    /// Seed phrase of the on-chain tree.
    fn seed_phrase(&self) -> Result<String>;

    /// Number of committed invitations.
    fn total_invitations(&self) -> Result<usize>;

    /// Invitation commitment at `index`.
    fn invitation_at(&self, index: usize) -> Result<Field>;
}

/// A shared handle to a ledger is itself a ledger; lets a test harness or
/// local setup keep registering invitations while a client reads.
impl<L: LedgerSource> LedgerSource for Rc<RefCell<L>> {
    fn levels(&self) -> Result<usize> {
        self.borrow().levels()
    }

    fn seed_phrase(&self) -> Result<String> {
        self.borrow().seed_phrase()
    }

    fn total_invitations(&self) -> Result<usize> {
        self.borrow().total_invitations()
    }

    fn invitation_at(&self, index: usize) -> Result<Field> {
        self.borrow().invitation_at(index)
    }
}

/// In-process ledger holding invitations as 32-byte big-endian words, the
/// way the contract stores them.
#[derive(Clone, Debug)]
pub struct InMemoryLedger {
    levels: usize,
    seed_phrase: String,
    invitations: Vec<[u8; 32]>,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new(levels: usize, seed_phrase: impl Into<String>) -> Self {
        Self {
            levels,
            seed_phrase: seed_phrase.into(),
            invitations: Vec::new(),
        }
    }

    /// Append a committed invitation, returning its leaf index.
    pub fn register(&mut self, invitation: Field) -> usize {
        self.invitations.push(to_bytes32(invitation));
        self.invitations.len() - 1
    }
}

impl LedgerSource for InMemoryLedger {
    fn levels(&self) -> Result<usize> {
        Ok(self.levels)
    }

    fn seed_phrase(&self) -> Result<String> {
        Ok(self.seed_phrase.clone())
    }

    fn total_invitations(&self) -> Result<usize> {
        Ok(self.invitations.len())
    }

    fn invitation_at(&self, index: usize) -> Result<Field> {
        let word = self.invitations.get(index).ok_or_else(|| {
            Error::SyncGapDetected(format!("invitation {index} is not available"))
        })?;
        from_bytes32(*word)
    }
}
