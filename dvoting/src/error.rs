use crate::*;

use thiserror::Error;

/// Broad classification of contract errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    Validation,
    State,
    Authorization,
    NotFound,
    Storage,
}

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    // Decoding
    // --------
    #[error("dvoting: failed to decode json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("dvoting: failed to encode cbor: {0}")]
    Cbor(#[from] serde_cbor::Error),

    #[error("dvoting: invalid hexadecimal: {0}")]
    BadHex(#[from] hex::FromHexError),

    #[error("dvoting: invalid base64: {0}")]
    BadBase64(#[from] base64::DecodeError),

    #[error("dvoting: invalid group point")]
    InvalidPoint,

    #[error("dvoting: invalid scalar")]
    InvalidScalar,

    #[error("dvoting: invalid BLS public key")]
    InvalidNodeKey,

    #[error("dvoting: invalid BLS signature")]
    InvalidNodeSignature,

    #[error("dvoting: invalid identifier - wrong length")]
    IdentifierBadLen,

    #[error("dvoting: embedded data is too long: {0} bytes")]
    EmbedTooLong(usize),

    #[error("dvoting: unknown command: {0}")]
    UnknownCommand(String),

    #[error("dvoting: missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("dvoting: expected exactly one transaction field, found {0}")]
    AmbiguousTransaction(usize),

    #[error("dvoting: command {command} does not match payload {payload}")]
    CommandMismatch { command: Command, payload: Command },

    // Validation
    // ----------
    #[error("dvoting: invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("dvoting: ballot is too large: {size} bytes, maximum is {max}")]
    BallotTooLarge { size: usize, max: usize },

    #[error("dvoting: invalid ballot: {0}")]
    InvalidBallot(String),

    #[error("dvoting: ciphervote has {found} chunks, expected {expected}")]
    WrongChunkCount { expected: usize, found: usize },

    #[error("dvoting: at least two ballots are required, found {0}")]
    NotEnoughBallots(usize),

    #[error("dvoting: wrong shuffle round: expected {expected}, found {found}")]
    RoundMismatch { expected: usize, found: usize },

    #[error("a node already submitted a shuffle")]
    DuplicateShuffle,

    #[error("dvoting: a node already submitted a shuffle with key {0}")]
    ShufflerAlreadyContributed(String),

    #[error("dvoting: signature verification failed")]
    SignatureVerificationFailed,

    #[error("dvoting: random vector from shuffle transaction is different than expected random vector")]
    RandomVectorMismatch,

    #[error("dvoting: shuffle proof failed to verify")]
    ShuffleVerificationFailed,

    #[error("dvoting: shuffle has the wrong shape: {0}")]
    ShuffleShape(String),

    #[error("dvoting: pubshares have the wrong shape: {0}")]
    PubsharesShape(String),

    #[error("dvoting: pubshares were already submitted by key {0}")]
    DuplicatePubsharesKey(String),

    #[error("dvoting: pubshares were already submitted for index {0}")]
    DuplicatePubsharesIndex(usize),

    #[error("dvoting: node index {index} is out of range for a roster of {roster_len}")]
    IndexOutOfRange { index: usize, roster_len: usize },

    #[error("dvoting: threshold {threshold} is invalid for a roster of {roster_len}")]
    InvalidThreshold { threshold: usize, roster_len: usize },

    #[error("dvoting: roster is empty")]
    EmptyRoster,

    #[error("dvoting: form {0} already exists")]
    FormAlreadyExists(String),

    #[error("dvoting: user {0} is already in the list")]
    DuplicateUser(String),

    #[error("dvoting: user {0} is not in the list")]
    UnknownUser(String),

    #[error("cannot remove this Admin because it is the only one remaining")]
    LastAdmin,

    #[error("cannot remove this owner because it is the only one remaining for this form")]
    LastOwner,

    #[error("dvoting: expected {expected} pubshares for decryption, found {found}")]
    NotEnoughShares { expected: usize, found: usize },

    // State
    // -----
    #[error("dvoting: form is {found}, expected {expected}")]
    WrongStatus {
        expected: FormStatus,
        found: FormStatus,
    },

    #[error("dvoting: form is {0} and can no longer change")]
    FinalStatus(FormStatus),

    #[error("dvoting: no DKG public key has been published for form {0}")]
    MissingDkgKey(String),

    #[error("dvoting: form {0} has not been shuffled")]
    NoShuffle(String),

    // Authorization
    // -------------
    #[error("dvoting: access denied: {0}")]
    AccessDenied(String),

    #[error("dvoting: user {0} is not an admin")]
    NotAdmin(String),

    #[error("dvoting: user {0} is neither an owner of this form nor an admin")]
    NotOwner(String),

    #[error("dvoting: user {0} is not allowed to vote in this form")]
    NotVoter(String),

    #[error("dvoting: public key {0} is not part of the roster")]
    NotRosterMember(String),

    // Not found
    // ---------
    #[error("dvoting: form {0} not found")]
    FormNotFound(String),

    #[error("dvoting: roster not found")]
    RosterNotFound,

    // Storage
    // -------
    #[error("dvoting: storage error: {0}")]
    Storage(#[from] StoreError),
}

impl Error {
    /// The kind of the error, as reported to the ledger
    pub fn kind(&self) -> ErrorKind {
        use Error::*;

        match self {
            Json(_)
            | Cbor(_)
            | BadHex(_)
            | BadBase64(_)
            | InvalidPoint
            | InvalidScalar
            | InvalidNodeKey
            | InvalidNodeSignature
            | IdentifierBadLen
            | EmbedTooLong(_)
            | UnknownCommand(_)
            | MissingArgument(_)
            | AmbiguousTransaction(_)
            | CommandMismatch { .. } => ErrorKind::Decode,

            WrongStatus { .. } | FinalStatus(_) | MissingDkgKey(_) | NoShuffle(_) => {
                ErrorKind::State
            }

            AccessDenied(_) | NotAdmin(_) | NotOwner(_) | NotVoter(_) | NotRosterMember(_) => {
                ErrorKind::Authorization
            }

            FormNotFound(_) | RosterNotFound => ErrorKind::NotFound,

            Storage(_) => ErrorKind::Storage,

            _ => ErrorKind::Validation,
        }
    }
}

/// A failed contract execution, tagged with the command that failed.
///
/// `command` is unset when the transaction was rejected before its command was decoded.
#[derive(Debug, Error)]
#[error("failed to {}: {source}", .command.map(Command::description).unwrap_or("execute command"))]
pub struct ContractError {
    pub command: Option<Command>,
    #[source]
    pub source: Error,
}

impl ContractError {
    pub fn new(command: Option<Command>, source: Error) -> Self {
        ContractError { command, source }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// Error reported by a snapshot implementation
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StoreError(pub String);
