use crate::*;
use ed25519_dalek::ExpandedSecretKey;
use ed25519_dalek::PublicKey;
use ed25519_dalek::SecretKey;
use ed25519_dalek::Signature;
use indexmap::IndexMap;

/// Argument naming the contract a transaction is addressed to
pub const CONTRACT_ARG: &str = "contract";

/// Name of the form contract
pub const CONTRACT_NAME: &str = "evoting";

/// Argument holding the command tag
pub const CMD_ARG: &str = "evoting:command";

/// Argument holding the JSON payload
pub const FORM_ARG: &str = "evoting:arg";

/// A transaction ID: SHA-256 of the signed part of the transaction
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId(pub [u8; 32]);

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "TxId({})", self)
    }
}

/// A transaction as ordered by the ledger.
///
/// Arguments are kept in insertion order so that every replica computes the same
/// signing bytes.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LedgerTransaction {
    pub nonce: u64,

    #[serde(with = "EdPublicKeyHex")]
    pub identity: PublicKey,

    pub args: IndexMap<String, String>,

    #[serde(with = "EdSignatureHex")]
    pub signature: Signature,
}

#[derive(Serialize)]
struct Unsigned<'a> {
    nonce: u64,
    identity: &'a [u8],
    args: &'a IndexMap<String, String>,
}

impl LedgerTransaction {
    /// Sign a transaction with the client's key
    pub fn sign(secret: &SecretKey, nonce: u64, args: IndexMap<String, String>) -> Result<Self, Error> {
        let identity = PublicKey::from(secret);
        let bytes = signing_bytes(nonce, &identity, &args)?;

        let expanded: ExpandedSecretKey = secret.into();
        let signature = expanded.sign(&bytes, &identity);

        Ok(LedgerTransaction {
            nonce,
            identity,
            args,
            signature,
        })
    }

    /// Build and sign a form contract transaction
    pub fn form(secret: &SecretKey, nonce: u64, tx: &FormTransaction) -> Result<Self, Error> {
        let mut args = IndexMap::new();
        args.insert(CONTRACT_ARG.to_owned(), CONTRACT_NAME.to_owned());
        args.insert(CMD_ARG.to_owned(), tx.command().tag().to_owned());
        args.insert(FORM_ARG.to_owned(), tx.to_json()?);

        LedgerTransaction::sign(secret, nonce, args)
    }

    /// Verify the client's signature
    pub fn verify_signature(&self) -> Result<(), Error> {
        let bytes = signing_bytes(self.nonce, &self.identity, &self.args)?;
        self.identity
            .verify_strict(&bytes, &self.signature)
            .map_err(|_| Error::SignatureVerificationFailed)
    }

    pub fn id(&self) -> Result<TxId, Error> {
        let bytes = signing_bytes(self.nonce, &self.identity, &self.args)?;
        Ok(TxId(sha256(&bytes)))
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }

    /// True if the transaction is addressed to the form contract
    pub fn is_form_transaction(&self) -> bool {
        self.arg(CONTRACT_ARG) == Some(CONTRACT_NAME)
    }

    /// The command tag, if any
    pub fn command(&self) -> Result<Command, Error> {
        let tag = self.arg(CMD_ARG).ok_or(Error::MissingArgument(CMD_ARG))?;
        Command::from_tag(tag)
    }

    /// Decode the form payload, checking it against the command tag
    pub fn form_transaction(&self) -> Result<FormTransaction, Error> {
        let command = self.command()?;
        let payload = self.arg(FORM_ARG).ok_or(Error::MissingArgument(FORM_ARG))?;
        FormTransaction::decode(command, payload.as_bytes())
    }
}

fn signing_bytes(
    nonce: u64,
    identity: &PublicKey,
    args: &IndexMap<String, String>,
) -> Result<Vec<u8>, Error> {
    let unsigned = Unsigned {
        nonce,
        identity: identity.as_bytes(),
        args,
    };
    Ok(serde_cbor::to_vec(&unsigned)?)
}

/// One contract execution: the transaction being run, and the transactions
/// already accepted earlier in the same block
#[derive(Debug, Clone)]
pub struct Step {
    pub previous: Vec<LedgerTransaction>,
    pub current: LedgerTransaction,
}

impl Step {
    pub fn new(current: LedgerTransaction) -> Self {
        Step {
            previous: vec![],
            current,
        }
    }

    /// The ID of the current transaction
    pub fn current_id(&self) -> Result<TxId, Error> {
        self.current.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let (secret, public) = generate_keypair();

        let tx = LedgerTransaction::form(
            &secret,
            3,
            &FormTransaction::OpenForm(OpenForm {
                form_id: "abcd".into(),
            }),
        )
        .unwrap();

        assert_eq!(tx.identity, public);
        tx.verify_signature().unwrap();
        assert!(tx.is_form_transaction());
        assert_eq!(tx.command().unwrap(), Command::OpenForm);
        assert!(matches!(
            tx.form_transaction().unwrap(),
            FormTransaction::OpenForm(_)
        ));

        // Same content, same ID. A new nonce gives a new ID.
        let again = LedgerTransaction::sign(&secret, 3, tx.args.clone()).unwrap();
        assert_eq!(again.id().unwrap(), tx.id().unwrap());
        let next = LedgerTransaction::sign(&secret, 4, tx.args.clone()).unwrap();
        assert_ne!(next.id().unwrap(), tx.id().unwrap());

        let mut tampered = tx.clone();
        tampered.nonce = 5;
        assert!(tampered.verify_signature().is_err());
    }

    #[test]
    fn json_round_trip() {
        let (secret, _) = generate_keypair();
        let mut args = IndexMap::new();
        args.insert(CMD_ARG.to_owned(), "OPEN_FORM".to_owned());

        let tx = LedgerTransaction::sign(&secret, 0, args).unwrap();
        let json = serde_json::to_string(&tx).unwrap();
        let decoded: LedgerTransaction = serde_json::from_str(&json).unwrap();

        decoded.verify_signature().unwrap();
        assert_eq!(decoded.id().unwrap(), tx.id().unwrap());
        assert!(!decoded.is_form_transaction());
        assert!(matches!(
            decoded.form_transaction(),
            Err(Error::MissingArgument(FORM_ARG))
        ));
    }
}
