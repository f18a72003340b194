use dvoting::{ContractError, TxId};
use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Dvoting(#[from] dvoting::Error),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("dvoting_node: invalid configuration: {0}")]
    Config(String),

    #[error("dvoting_node: dkg failed: {0}")]
    Dkg(String),

    #[error("dvoting_node: dealer {0} sent a share that does not match its commitments")]
    InvalidDeal(usize),

    #[error("dvoting_node: this node is not part of the roster")]
    NotInRoster,

    #[error("dvoting_node: transaction {0} was not included in time")]
    Timeout(TxId),

    #[error("dvoting_node: transaction {id} was rejected: {reason}")]
    Rejected { id: TxId, reason: String },

    #[error("dvoting_node: giving up after {0} attempts")]
    RetriesExhausted(usize),

    #[error("dvoting_node: ledger event stream closed")]
    EventsClosed,

    #[error("dvoting_node: ledger state lock poisoned")]
    Poisoned,

    #[error("dvoting_node: background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
