use crate::*;
use ed25519_dalek::PublicKey;
use std::collections::BTreeSet;

/// Unique identifier of the form contract in access credentials
pub const CONTRACT_UID: &str = "EVOT";

/// What an identity must be granted to run a contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    pub contract: String,
    pub task: String,
}

impl Credential {
    pub fn new(id: &str, contract: &str, task: &str) -> Self {
        Credential {
            id: id.to_owned(),
            contract: contract.to_owned(),
            task: task.to_owned(),
        }
    }

    /// The credential every form transaction is checked against
    pub fn form_contract() -> Self {
        Credential::new(CONTRACT_UID, CONTRACT_NAME, "all")
    }

    /// Storage key of the identities granted this credential
    pub fn key(&self) -> [u8; 32] {
        sha256(format!("access:{}:{}:{}", self.id, self.contract, self.task).as_bytes())
    }
}

/// Decides whether an identity may run a contract
pub trait AccessControl {
    fn check(
        &self,
        snapshot: &dyn Snapshot,
        credential: &Credential,
        identity: &PublicKey,
    ) -> Result<(), Error>;
}

/// Grants every identity
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessControl for AllowAll {
    fn check(&self, _: &dyn Snapshot, _: &Credential, _: &PublicKey) -> Result<(), Error> {
        Ok(())
    }
}

/// Grants identities listed under the credential's key in the snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotAccess;

impl SnapshotAccess {
    /// Add identities to a credential
    pub fn grant(
        snapshot: &mut dyn Snapshot,
        credential: &Credential,
        identities: &[PublicKey],
    ) -> Result<(), Error> {
        let mut granted = SnapshotAccess::granted(snapshot, credential)?;
        for identity in identities {
            granted.insert(hex::encode(identity.as_bytes()));
        }
        snapshot.set(&credential.key(), serde_json::to_vec(&granted)?)?;
        Ok(())
    }

    fn granted(snapshot: &dyn Snapshot, credential: &Credential) -> Result<BTreeSet<String>, Error> {
        match snapshot.get(&credential.key())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(BTreeSet::new()),
        }
    }
}

impl AccessControl for SnapshotAccess {
    fn check(
        &self,
        snapshot: &dyn Snapshot,
        credential: &Credential,
        identity: &PublicKey,
    ) -> Result<(), Error> {
        let identity = hex::encode(identity.as_bytes());
        if SnapshotAccess::granted(snapshot, credential)?.contains(&identity) {
            Ok(())
        } else {
            Err(Error::AccessDenied(identity))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_access() {
        let (_, alice) = generate_keypair();
        let (_, bob) = generate_keypair();
        let credential = Credential::form_contract();
        let mut snapshot = MemSnapshot::default();

        assert!(SnapshotAccess
            .check(&snapshot, &credential, &alice)
            .is_err());

        SnapshotAccess::grant(&mut snapshot, &credential, &[alice]).unwrap();
        SnapshotAccess.check(&snapshot, &credential, &alice).unwrap();

        let err = SnapshotAccess
            .check(&snapshot, &credential, &bob)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        // Another credential is not granted
        let other = Credential::new(CONTRACT_UID, CONTRACT_NAME, "read");
        assert!(SnapshotAccess.check(&snapshot, &other, &alice).is_err());

        AllowAll.check(&snapshot, &other, &bob).unwrap();
    }
}
