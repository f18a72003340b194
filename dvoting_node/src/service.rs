use crate::NodeError;
use dvoting::{Form, LedgerTransaction, TxId};
use ed25519_dalek::PublicKey;
use tokio::sync::broadcast;

/// The outcome of a transaction once the ledger processed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxEvent {
    pub id: TxId,

    /// `Err` holds the rejection message
    pub result: Result<(), String>,
}

impl TxEvent {
    pub fn accepted(&self) -> bool {
        self.result.is_ok()
    }
}

/// What a node needs from the ledger: a transaction pool, the stream of
/// processed transactions, read access to forms and nonce assignment
pub trait Service: Send + Sync {
    /// Add a transaction to the pool
    fn add(&self, tx: LedgerTransaction) -> Result<TxId, NodeError>;

    /// Subscribe to processed transactions. Events sent before the call are not seen.
    fn watch(&self) -> broadcast::Receiver<TxEvent>;

    /// Current state of a form
    fn form(&self, form_id: &str) -> Result<Form, NodeError>;

    /// Reserve the next nonce for an identity
    fn nonce(&self, identity: &PublicKey) -> Result<u64, NodeError>;
}
