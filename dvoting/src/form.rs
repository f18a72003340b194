use crate::*;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// Well-known key of the list of existing forms
pub const FORMS_METADATA_KEY: &[u8] = b"FormsMetadataKey";

/// Lifecycle of a form. Persisted as its numeric code.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum FormStatus {
    Initial = 0,
    Open = 1,
    Closed = 2,
    ShuffledBallots = 3,
    PubSharesSubmitted = 4,
    ResultAvailable = 5,
    Canceled = 6,
}

impl fmt::Display for FormStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            FormStatus::Initial => "initial",
            FormStatus::Open => "open",
            FormStatus::Closed => "closed",
            FormStatus::ShuffledBallots => "shuffled",
            FormStatus::PubSharesSubmitted => "pubshares submitted",
            FormStatus::ResultAvailable => "result available",
            FormStatus::Canceled => "canceled",
        };
        write!(f, "{}", name)
    }
}

impl FormStatus {
    /// No transition leaves a terminal status
    pub fn is_terminal(self) -> bool {
        matches!(self, FormStatus::ResultAvailable | FormStatus::Canceled)
    }
}

/// One accepted shuffle round
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ShuffleInstance {
    pub shuffled_ballots: Vec<Ciphervote>,
    pub shuffle_proof: ShuffleProof,
    pub shuffler_public_key: NodePublicKey,
}

/// The decryption shares submitted so far, one entry per node
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct PubsharesUnits {
    /// `pubshares[i][ballot][chunk]`
    pub pubshares: Vec<Vec<Vec<Point>>>,
    pub pub_keys: Vec<NodePublicKey>,
    pub indexes: Vec<usize>,
}

impl PubsharesUnits {
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

/// The state of one vote, from configuration to decrypted ballots
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Form {
    #[serde(rename = "FormID")]
    pub form_id: String,
    pub configuration: Configuration,
    pub status: FormStatus,
    pub pubkey: Option<Point>,
    pub ballot_size: usize,
    pub suffragia: Suffragia,
    pub ballot_count: usize,
    pub shuffle_instances: Vec<ShuffleInstance>,
    pub shuffle_threshold: usize,
    pub pubshares_units: PubsharesUnits,
    pub decrypted_ballots: Vec<Ballot>,
    pub roster: Roster,

    /// The user who created the form
    #[serde(rename = "AdminID")]
    pub admin_id: String,
    pub owners: Vec<String>,
    pub voters: Vec<String>,
}

impl Form {
    /// A new form in the `Initial` status, owned by its creator
    pub fn new(
        form_id: String,
        configuration: Configuration,
        roster: Roster,
        admin_id: String,
    ) -> Result<Self, Error> {
        if roster.is_empty() {
            return Err(Error::EmptyRoster);
        }

        let shuffle_threshold = shuffle_threshold(roster.len());
        if shuffle_threshold < 1 || 3 * shuffle_threshold < 2 * roster.len() + 1 {
            return Err(Error::InvalidThreshold {
                threshold: shuffle_threshold,
                roster_len: roster.len(),
            });
        }

        Ok(Form {
            form_id,
            ballot_size: configuration.max_ballot_size(),
            configuration,
            status: FormStatus::Initial,
            pubkey: None,
            suffragia: Suffragia::default(),
            ballot_count: 0,
            shuffle_instances: vec![],
            shuffle_threshold,
            pubshares_units: PubsharesUnits::default(),
            decrypted_ballots: vec![],
            roster,
            owners: vec![admin_id.clone()],
            admin_id,
            voters: vec![],
        })
    }

    /// Read a form from the snapshot
    pub fn load(snapshot: &dyn Snapshot, form_id: &str) -> Result<Self, Error> {
        let key = decode_form_id(form_id)?;
        let bytes = snapshot
            .get(&key)?
            .ok_or_else(|| Error::FormNotFound(form_id.to_owned()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write the form back under its key
    pub fn store(&self, snapshot: &mut dyn Snapshot) -> Result<(), Error> {
        let key = decode_form_id(&self.form_id)?;
        snapshot.set(&key, serde_json::to_vec(self)?)?;
        Ok(())
    }

    pub fn require_status(&self, expected: FormStatus) -> Result<(), Error> {
        if self.status != expected {
            return Err(Error::WrongStatus {
                expected,
                found: self.status,
            });
        }
        Ok(())
    }

    /// Fail once the form can no longer change
    pub fn require_not_terminal(&self) -> Result<(), Error> {
        if self.status.is_terminal() {
            return Err(Error::FinalStatus(self.status));
        }
        Ok(())
    }

    pub fn chunks_per_ballot(&self) -> usize {
        chunks_for_size(self.ballot_size)
    }

    pub fn owner_index(&self, user_id: &str) -> Option<usize> {
        self.owners.iter().position(|o| o == user_id)
    }

    pub fn voter_index(&self, user_id: &str) -> Option<usize> {
        self.voters.iter().position(|v| v == user_id)
    }

    /// An empty voter list lets anyone vote
    pub fn may_vote(&self, user_id: &str) -> bool {
        self.voters.is_empty() || self.voter_index(user_id).is_some()
    }

    /// The ciphervotes a shuffle of round `round` takes as input
    pub fn shuffle_inputs(&self, round: usize) -> Result<&[Ciphervote], Error> {
        if round == 0 {
            Ok(&self.suffragia.ciphervotes)
        } else {
            self.shuffle_instances
                .get(round - 1)
                .map(|s| s.shuffled_ballots.as_slice())
                .ok_or(Error::RoundMismatch {
                    expected: self.shuffle_instances.len(),
                    found: round,
                })
        }
    }

    /// The output of the last shuffle round
    pub fn final_ballots(&self) -> Result<&[Ciphervote], Error> {
        self.shuffle_instances
            .last()
            .map(|s| s.shuffled_ballots.as_slice())
            .ok_or_else(|| Error::NoShuffle(self.form_id.clone()))
    }
}

/// The IDs of all existing forms
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct FormsMetadata {
    #[serde(rename = "FormsIDs")]
    pub forms_ids: Vec<String>,
}

impl FormsMetadata {
    /// Read the metadata, empty if no form was ever created
    pub fn load(snapshot: &dyn Snapshot) -> Result<Self, Error> {
        match snapshot.get(FORMS_METADATA_KEY)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(FormsMetadata::default()),
        }
    }

    pub fn store(&self, snapshot: &mut dyn Snapshot) -> Result<(), Error> {
        snapshot.set(FORMS_METADATA_KEY, serde_json::to_vec(self)?)?;
        Ok(())
    }

    pub fn contains(&self, form_id: &str) -> bool {
        self.forms_ids.iter().any(|f| f == form_id)
    }

    pub fn add(&mut self, form_id: &str) -> Result<(), Error> {
        if self.contains(form_id) {
            return Err(Error::FormAlreadyExists(form_id.to_owned()));
        }
        self.forms_ids.push(form_id.to_owned());
        Ok(())
    }

    pub fn remove(&mut self, form_id: &str) {
        self.forms_ids.retain(|f| f != form_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn roster(n: u8) -> Roster {
        Roster::new(
            (0..n)
                .map(|i| RosterNode {
                    address: format!("node{}", i),
                    public_key: NodeSigner::from_ikm(&[i; 32]).unwrap().public_key(),
                })
                .collect(),
        )
    }

    fn config() -> Configuration {
        Configuration {
            main_title: "Form".to_owned(),
            scaffold: vec![Subject {
                id: "c3Viag==".to_owned(),
                selects: vec![Select {
                    id: "cTE=".to_owned(),
                    title: "q".to_owned(),
                    max_n: 2,
                    min_n: 1,
                    choices: vec!["a".into(), "b".into(), "c".into()],
                }],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn status_codes() {
        assert_eq!(serde_json::to_string(&FormStatus::Initial).unwrap(), "0");
        assert_eq!(serde_json::to_string(&FormStatus::Canceled).unwrap(), "6");
        let status: FormStatus = serde_json::from_str("3").unwrap();
        assert_eq!(status, FormStatus::ShuffledBallots);
        assert!(serde_json::from_str::<FormStatus>("7").is_err());

        assert!(FormStatus::Open > FormStatus::Initial);
        assert!(FormStatus::ResultAvailable.is_terminal());
        assert!(!FormStatus::Closed.is_terminal());
    }

    #[test]
    fn form_round_trip() {
        let form_id = hex::encode([1u8; 32]);
        let mut form = Form::new(form_id.clone(), config(), roster(3), "alice".into()).unwrap();
        form.pubkey = Some(Point::base());

        assert_eq!(form.shuffle_threshold, 3);
        assert_eq!(form.owners, vec!["alice".to_owned()]);
        assert_eq!(form.ballot_size, config().max_ballot_size());

        let mut snapshot = MemSnapshot::default();
        form.store(&mut snapshot).unwrap();

        let loaded = Form::load(&snapshot, &form_id).unwrap();
        assert_eq!(loaded, form);

        let json = serde_json::to_value(&form).unwrap();
        assert_eq!(json["Status"], 0);
        assert!(json.get("FormID").is_some());

        assert!(matches!(
            Form::load(&snapshot, &hex::encode([2u8; 32])),
            Err(Error::FormNotFound(_))
        ));
        assert!(Form::load(&snapshot, "abcd").is_err());
    }

    #[test]
    fn empty_roster_is_rejected() {
        let res = Form::new(hex::encode([1u8; 32]), config(), Roster::default(), "a".into());
        assert!(matches!(res, Err(Error::EmptyRoster)));
    }

    #[test]
    fn metadata() {
        let mut snapshot = MemSnapshot::default();
        let mut metadata = FormsMetadata::load(&snapshot).unwrap();
        assert!(metadata.forms_ids.is_empty());

        metadata.add("aa").unwrap();
        metadata.add("bb").unwrap();
        assert!(metadata.add("aa").is_err());
        metadata.store(&mut snapshot).unwrap();

        let raw = snapshot.get(FORMS_METADATA_KEY).unwrap().unwrap();
        assert_eq!(raw, br#"{"FormsIDs":["aa","bb"]}"#.to_vec());

        let mut metadata = FormsMetadata::load(&snapshot).unwrap();
        metadata.remove("aa");
        assert_eq!(metadata.forms_ids, vec!["bb".to_owned()]);
    }
}
