use crate::*;

/// Well-known key of the current roster in the global state
pub const ROSTER_KEY: &[u8] = b"RosterKey";

/// One member of the authority set
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct RosterNode {
    pub address: String,
    pub public_key: NodePublicKey,
}

/// The ordered authority set that runs the DKG, the shuffle and the decryption
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct Roster(pub Vec<RosterNode>);

impl Roster {
    pub fn new(nodes: Vec<RosterNode>) -> Self {
        Roster(nodes)
    }

    /// Read the roster from the global state
    pub fn load(snapshot: &dyn Snapshot) -> Result<Self, Error> {
        let bytes = snapshot.get(ROSTER_KEY)?.ok_or(Error::RosterNotFound)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Publish the roster to the global state
    pub fn store(&self, snapshot: &mut dyn Snapshot) -> Result<(), Error> {
        snapshot.set(ROSTER_KEY, serde_json::to_vec(self)?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position of the node with the given key
    pub fn index_of(&self, public_key: &NodePublicKey) -> Option<usize> {
        self.0.iter().position(|n| &n.public_key == public_key)
    }

    pub fn contains(&self, public_key: &NodePublicKey) -> bool {
        self.index_of(public_key).is_some()
    }

    pub fn get(&self, index: usize) -> Option<&RosterNode> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RosterNode> {
        self.0.iter()
    }
}

/// Number of shuffle rounds needed for a roster of `n` nodes: ⌈(2n+1)/3⌉
pub fn shuffle_threshold(n: usize) -> usize {
    (2 * n + 1 + 2) / 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds() {
        assert_eq!(shuffle_threshold(1), 1);
        assert_eq!(shuffle_threshold(2), 2);
        assert_eq!(shuffle_threshold(3), 3);
        assert_eq!(shuffle_threshold(4), 3);
        assert_eq!(shuffle_threshold(7), 5);

        for n in 1..50 {
            let t = shuffle_threshold(n);
            assert!(t >= 1);
            assert!(3 * t >= 2 * n + 1);
            assert!(t <= n);
        }
    }

    #[test]
    fn store_and_lookup() {
        let nodes: Vec<RosterNode> = (0..3u8)
            .map(|i| RosterNode {
                address: format!("127.0.0.1:{}", 2000 + i as u16),
                public_key: NodeSigner::from_ikm(&[i; 32]).unwrap().public_key(),
            })
            .collect();
        let roster = Roster::new(nodes.clone());

        let mut snapshot = MemSnapshot::default();
        assert!(matches!(
            Roster::load(&snapshot),
            Err(Error::RosterNotFound)
        ));

        roster.store(&mut snapshot).unwrap();
        let loaded = Roster::load(&snapshot).unwrap();
        assert_eq!(loaded, roster);
        assert_eq!(loaded.index_of(&nodes[2].public_key), Some(2));

        let outsider = NodeSigner::from_ikm(&[9u8; 32]).unwrap().public_key();
        assert!(!loaded.contains(&outsider));
    }
}
