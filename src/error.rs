use thiserror::Error;

/// Failure taxonomy of the client and tree.
///
/// Precondition violations and storage failures in tree updates surface
/// before any batched write, so a caller observing an error can assume no
/// partial mutation happened.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A value does not reduce into the field, or a storage key is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// `insert` targeted an existing index, or `update` targeted a new one.
    #[error("index {index} violates the insert/update policy (tree holds {total} leaves, insert = {insert})")]
    IndexPolicyViolation {
        index: usize,
        total: usize,
        insert: bool,
    },

    /// No leaf of the synced tree matches the invitation commitment.
    #[error("invitation is not registered in the tree")]
    InvitationNotFound,

    /// The backing key-value store failed to read or write.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// The ledger count went backwards or an advertised leaf is unavailable.
    /// Must never happen under a correctly append-only ledger; fatal.
    #[error("sync gap detected: {0}")]
    SyncGapDetected(String),

    /// The ledger collaborator could not be read.
    #[error("ledger read failed: {0}")]
    Ledger(String),

    /// The proving backend failed to produce a proof.
    #[error("proof generation failed: {0}")]
    Proof(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
