use crate::*;
use sha2::{Digest, Sha256};

/// The encrypted ballots of a form, one per voter, in first-cast order
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Suffragia {
    #[serde(rename = "UserIDs")]
    pub voter_ids: Vec<String>,
    pub ciphervotes: Vec<Ciphervote>,
}

impl Suffragia {
    /// Record a vote. A revote replaces the earlier ciphervote at its original index.
    ///
    /// Returns true if this is the voter's first vote.
    pub fn cast_vote(&mut self, voter_id: &str, ciphervote: Ciphervote) -> bool {
        match self.voter_ids.iter().position(|v| v == voter_id) {
            Some(index) => {
                self.ciphervotes[index] = ciphervote;
                false
            }
            None => {
                self.voter_ids.push(voter_id.to_owned());
                self.ciphervotes.push(ciphervote);
                true
            }
        }
    }

    /// SHA-256 over every voter ID followed by its serialized ciphervote
    pub fn hash(&self) -> Result<[u8; 32], Error> {
        let mut hasher = Sha256::new();
        for (voter_id, ciphervote) in self.voter_ids.iter().zip(&self.ciphervotes) {
            hasher.update(voter_id.as_bytes());
            hasher.update(serde_json::to_vec(ciphervote)?);
        }

        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.voter_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voter_ids.is_empty()
    }

    pub fn get(&self, voter_id: &str) -> Option<&Ciphervote> {
        self.voter_ids
            .iter()
            .position(|v| v == voter_id)
            .map(|i| &self.ciphervotes[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::scalar::Scalar;

    fn vote(data: &[u8]) -> Ciphervote {
        let mut rng = rand::rngs::OsRng {};
        let public = Point::mul_base(&Scalar::from(7u64));
        Ciphervote::encrypt(&mut rng, &public, data, 1).unwrap()
    }

    #[test]
    fn revote_keeps_index() {
        let mut suffragia = Suffragia::default();
        let a = vote(b"a");
        let b = vote(b"b");
        let other = vote(b"other");

        assert!(suffragia.cast_vote("v", a.clone()));
        assert!(suffragia.cast_vote("w", other.clone()));
        let before = suffragia.hash().unwrap();

        assert!(!suffragia.cast_vote("v", b.clone()));

        assert_eq!(suffragia.len(), 2);
        assert_eq!(suffragia.voter_ids, vec!["v".to_owned(), "w".to_owned()]);
        assert_eq!(suffragia.ciphervotes[0], b);
        assert_eq!(suffragia.get("w"), Some(&other));
        assert_ne!(suffragia.hash().unwrap(), before);
    }

    #[test]
    fn hash_depends_on_order() {
        let a = vote(b"a");
        let b = vote(b"b");

        let mut first = Suffragia::default();
        first.cast_vote("1", a.clone());
        first.cast_vote("2", b.clone());

        let mut second = Suffragia::default();
        second.cast_vote("2", b);
        second.cast_vote("1", a);

        assert_eq!(first.hash().unwrap(), first.clone().hash().unwrap());
        assert_ne!(first.hash().unwrap(), second.hash().unwrap());
    }
}
