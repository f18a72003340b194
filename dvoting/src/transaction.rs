use crate::*;
use curve25519_dalek::scalar::Scalar;
use digest::Digest;
use sha2::Sha256;
use std::fmt;

/// The closed set of form commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    CreateForm,
    OpenForm,
    CastVote,
    CloseForm,
    ShuffleBallots,
    RegisterPubShares,
    CombineShares,
    CancelForm,
    DeleteForm,
    AddAdmin,
    RemoveAdmin,
    AddOwner,
    RemoveOwner,
    AddVoter,
    RemoveVoter,
}

const COMMANDS: [Command; 15] = [
    Command::CreateForm,
    Command::OpenForm,
    Command::CastVote,
    Command::CloseForm,
    Command::ShuffleBallots,
    Command::RegisterPubShares,
    Command::CombineShares,
    Command::CancelForm,
    Command::DeleteForm,
    Command::AddAdmin,
    Command::RemoveAdmin,
    Command::AddOwner,
    Command::RemoveOwner,
    Command::AddVoter,
    Command::RemoveVoter,
];

impl Command {
    /// The value of the `evoting:command` argument
    pub fn tag(self) -> &'static str {
        match self {
            Command::CreateForm => "CREATE_FORM",
            Command::OpenForm => "OPEN_FORM",
            Command::CastVote => "CAST_VOTE",
            Command::CloseForm => "CLOSE_FORM",
            Command::ShuffleBallots => "SHUFFLE_BALLOTS",
            Command::RegisterPubShares => "REGISTER_PUB_SHARES",
            Command::CombineShares => "COMBINE_SHARES",
            Command::CancelForm => "CANCEL_FORM",
            Command::DeleteForm => "DELETE_FORM",
            Command::AddAdmin => "ADD_ADMIN",
            Command::RemoveAdmin => "REMOVE_ADMIN",
            Command::AddOwner => "ADD_OWNER",
            Command::RemoveOwner => "REMOVE_OWNER",
            Command::AddVoter => "ADD_VOTER",
            Command::RemoveVoter => "REMOVE_VOTER",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, Error> {
        COMMANDS
            .iter()
            .copied()
            .find(|c| c.tag() == tag)
            .ok_or_else(|| Error::UnknownCommand(tag.to_owned()))
    }

    /// Human readable action, used in error messages
    pub fn description(self) -> &'static str {
        match self {
            Command::CreateForm => "create form",
            Command::OpenForm => "open form",
            Command::CastVote => "cast vote",
            Command::CloseForm => "close form",
            Command::ShuffleBallots => "shuffle ballots",
            Command::RegisterPubShares => "register pubshares",
            Command::CombineShares => "combine shares",
            Command::CancelForm => "cancel form",
            Command::DeleteForm => "delete form",
            Command::AddAdmin => "add admin",
            Command::RemoveAdmin => "remove admin",
            Command::AddOwner => "add owner",
            Command::RemoveOwner => "remove owner",
            Command::AddVoter => "add voter",
            Command::RemoveVoter => "remove voter",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CreateForm {
    pub configuration: Configuration,
    #[serde(rename = "AdminID")]
    pub admin_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct OpenForm {
    #[serde(rename = "FormID")]
    pub form_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CastVote {
    #[serde(rename = "FormID")]
    pub form_id: String,
    #[serde(rename = "UserID")]
    pub user_id: String,
    pub ballot: Ciphervote,
}

/// Payload shared by the commands a form admin performs on a whole form
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct FormAction {
    #[serde(rename = "FormID")]
    pub form_id: String,
    #[serde(rename = "UserID")]
    pub user_id: String,
}

/// A mixer's contribution: one shuffle round, signed by the node
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ShuffleBallots {
    #[serde(rename = "FormID")]
    pub form_id: String,
    pub round: usize,
    pub shuffled_ballots: Vec<Ciphervote>,
    pub proof: ShuffleProof,
    #[serde(with = "ScalarsHex")]
    pub random_vector: Vec<Scalar>,
    pub public_key: NodePublicKey,
    pub signature: NodeSignature,
}

impl ShuffleBallots {
    /// Build and sign a contribution
    pub fn new(
        form_id: String,
        round: usize,
        shuffled_ballots: Vec<Ciphervote>,
        proof: ShuffleProof,
        random_vector: Vec<Scalar>,
        signer: &NodeSigner,
    ) -> Self {
        let fingerprint =
            shuffle_fingerprint(&form_id, round, &shuffled_ballots, &random_vector);

        ShuffleBallots {
            form_id,
            round,
            shuffled_ballots,
            proof,
            random_vector,
            public_key: signer.public_key(),
            signature: signer.sign(&fingerprint),
        }
    }

    /// SHA256(form_id || round || shuffled ballots || random vector)
    pub fn fingerprint(&self) -> [u8; 32] {
        shuffle_fingerprint(
            &self.form_id,
            self.round,
            &self.shuffled_ballots,
            &self.random_vector,
        )
    }
}

fn shuffle_fingerprint(
    form_id: &str,
    round: usize,
    ballots: &[Ciphervote],
    random_vector: &[Scalar],
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(form_id.as_bytes());
    hasher.update((round as u64).to_be_bytes());
    for ballot in ballots {
        ballot.fingerprint(&mut hasher);
    }
    for e in random_vector {
        hasher.update(e.as_bytes());
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// A node's decryption shares for every chunk of every shuffled ballot
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterPubShares {
    #[serde(rename = "FormID")]
    pub form_id: String,
    pub index: usize,
    pub pubshares: Vec<Vec<Point>>,
    pub public_key: NodePublicKey,
    pub signature: NodeSignature,
}

impl RegisterPubShares {
    pub fn new(form_id: String, index: usize, pubshares: Vec<Vec<Point>>, signer: &NodeSigner) -> Self {
        let fingerprint = pubshares_fingerprint(&form_id, index, &pubshares);

        RegisterPubShares {
            form_id,
            index,
            pubshares,
            public_key: signer.public_key(),
            signature: signer.sign(&fingerprint),
        }
    }

    /// SHA256(form_id || index || shares)
    pub fn fingerprint(&self) -> [u8; 32] {
        pubshares_fingerprint(&self.form_id, self.index, &self.pubshares)
    }
}

fn pubshares_fingerprint(form_id: &str, index: usize, pubshares: &[Vec<Point>]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(form_id.as_bytes());
    hasher.update((index as u64).to_be_bytes());
    for ballot in pubshares {
        for share in ballot {
            hasher.update(share.to_bytes());
        }
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Change the global admin list
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AdminChange {
    #[serde(rename = "PerformingUserID")]
    pub performer: String,
    #[serde(rename = "TargetUserID")]
    pub target: String,
}

/// Change the owners or voters of a form
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FormUserChange {
    #[serde(rename = "FormID")]
    pub form_id: String,
    #[serde(rename = "PerformingUserID")]
    pub performer: String,
    #[serde(rename = "TargetUserID")]
    pub target: String,
}

/// A decoded form transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormTransaction {
    CreateForm(CreateForm),
    OpenForm(OpenForm),
    CastVote(CastVote),
    CloseForm(FormAction),
    ShuffleBallots(ShuffleBallots),
    RegisterPubShares(RegisterPubShares),
    CombineShares(FormAction),
    CancelForm(FormAction),
    DeleteForm(FormAction),
    AddAdmin(AdminChange),
    RemoveAdmin(AdminChange),
    AddOwner(FormUserChange),
    RemoveOwner(FormUserChange),
    AddVoter(FormUserChange),
    RemoveVoter(FormUserChange),
}

/// Wire format: one object whose single non-null field selects the variant
#[derive(Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct Envelope {
    #[serde(rename = "CreateForm", default, skip_serializing_if = "Option::is_none")]
    create_form: Option<CreateForm>,
    #[serde(rename = "OpenForm", default, skip_serializing_if = "Option::is_none")]
    open_form: Option<OpenForm>,
    #[serde(rename = "CastVote", default, skip_serializing_if = "Option::is_none")]
    cast_vote: Option<CastVote>,
    #[serde(rename = "CloseForm", default, skip_serializing_if = "Option::is_none")]
    close_form: Option<FormAction>,
    #[serde(rename = "ShuffleBallots", default, skip_serializing_if = "Option::is_none")]
    shuffle_ballots: Option<ShuffleBallots>,
    #[serde(rename = "RegisterPubShares", default, skip_serializing_if = "Option::is_none")]
    register_pub_shares: Option<RegisterPubShares>,
    #[serde(rename = "CombineShares", default, skip_serializing_if = "Option::is_none")]
    combine_shares: Option<FormAction>,
    #[serde(rename = "CancelForm", default, skip_serializing_if = "Option::is_none")]
    cancel_form: Option<FormAction>,
    #[serde(rename = "DeleteForm", default, skip_serializing_if = "Option::is_none")]
    delete_form: Option<FormAction>,
    #[serde(rename = "AddAdmin", default, skip_serializing_if = "Option::is_none")]
    add_admin: Option<AdminChange>,
    #[serde(rename = "RemoveAdmin", default, skip_serializing_if = "Option::is_none")]
    remove_admin: Option<AdminChange>,
    #[serde(rename = "AddOwner", default, skip_serializing_if = "Option::is_none")]
    add_owner: Option<FormUserChange>,
    #[serde(rename = "RemoveOwner", default, skip_serializing_if = "Option::is_none")]
    remove_owner: Option<FormUserChange>,
    #[serde(rename = "AddVoter", default, skip_serializing_if = "Option::is_none")]
    add_voter: Option<FormUserChange>,
    #[serde(rename = "RemoveVoter", default, skip_serializing_if = "Option::is_none")]
    remove_voter: Option<FormUserChange>,
}

impl Envelope {
    fn into_transaction(self) -> Result<FormTransaction, Error> {
        let Envelope {
            create_form,
            open_form,
            cast_vote,
            close_form,
            shuffle_ballots,
            register_pub_shares,
            combine_shares,
            cancel_form,
            delete_form,
            add_admin,
            remove_admin,
            add_owner,
            remove_owner,
            add_voter,
            remove_voter,
        } = self;

        let mut found = Vec::with_capacity(1);

        macro_rules! take {
            ($field:ident, $variant:ident) => {
                if let Some(payload) = $field {
                    found.push(FormTransaction::$variant(payload));
                }
            };
        }

        take!(create_form, CreateForm);
        take!(open_form, OpenForm);
        take!(cast_vote, CastVote);
        take!(close_form, CloseForm);
        take!(shuffle_ballots, ShuffleBallots);
        take!(register_pub_shares, RegisterPubShares);
        take!(combine_shares, CombineShares);
        take!(cancel_form, CancelForm);
        take!(delete_form, DeleteForm);
        take!(add_admin, AddAdmin);
        take!(remove_admin, RemoveAdmin);
        take!(add_owner, AddOwner);
        take!(remove_owner, RemoveOwner);
        take!(add_voter, AddVoter);
        take!(remove_voter, RemoveVoter);

        if found.len() != 1 {
            return Err(Error::AmbiguousTransaction(found.len()));
        }
        found.pop().ok_or(Error::AmbiguousTransaction(0))
    }
}

impl From<FormTransaction> for Envelope {
    fn from(tx: FormTransaction) -> Self {
        let mut envelope = Envelope::default();
        match tx {
            FormTransaction::CreateForm(p) => envelope.create_form = Some(p),
            FormTransaction::OpenForm(p) => envelope.open_form = Some(p),
            FormTransaction::CastVote(p) => envelope.cast_vote = Some(p),
            FormTransaction::CloseForm(p) => envelope.close_form = Some(p),
            FormTransaction::ShuffleBallots(p) => envelope.shuffle_ballots = Some(p),
            FormTransaction::RegisterPubShares(p) => envelope.register_pub_shares = Some(p),
            FormTransaction::CombineShares(p) => envelope.combine_shares = Some(p),
            FormTransaction::CancelForm(p) => envelope.cancel_form = Some(p),
            FormTransaction::DeleteForm(p) => envelope.delete_form = Some(p),
            FormTransaction::AddAdmin(p) => envelope.add_admin = Some(p),
            FormTransaction::RemoveAdmin(p) => envelope.remove_admin = Some(p),
            FormTransaction::AddOwner(p) => envelope.add_owner = Some(p),
            FormTransaction::RemoveOwner(p) => envelope.remove_owner = Some(p),
            FormTransaction::AddVoter(p) => envelope.add_voter = Some(p),
            FormTransaction::RemoveVoter(p) => envelope.remove_voter = Some(p),
        }
        envelope
    }
}

impl FormTransaction {
    /// The command this transaction runs
    pub fn command(&self) -> Command {
        match self {
            FormTransaction::CreateForm(_) => Command::CreateForm,
            FormTransaction::OpenForm(_) => Command::OpenForm,
            FormTransaction::CastVote(_) => Command::CastVote,
            FormTransaction::CloseForm(_) => Command::CloseForm,
            FormTransaction::ShuffleBallots(_) => Command::ShuffleBallots,
            FormTransaction::RegisterPubShares(_) => Command::RegisterPubShares,
            FormTransaction::CombineShares(_) => Command::CombineShares,
            FormTransaction::CancelForm(_) => Command::CancelForm,
            FormTransaction::DeleteForm(_) => Command::DeleteForm,
            FormTransaction::AddAdmin(_) => Command::AddAdmin,
            FormTransaction::RemoveAdmin(_) => Command::RemoveAdmin,
            FormTransaction::AddOwner(_) => Command::AddOwner,
            FormTransaction::RemoveOwner(_) => Command::RemoveOwner,
            FormTransaction::AddVoter(_) => Command::AddVoter,
            FormTransaction::RemoveVoter(_) => Command::RemoveVoter,
        }
    }

    /// Encode into the JSON wire format
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&Envelope::from(self.clone()))?)
    }

    /// Decode from the JSON wire format
    pub fn from_json(bytes: &[u8]) -> Result<Self, Error> {
        let envelope: Envelope = serde_json::from_slice(bytes)?;
        envelope.into_transaction()
    }

    /// Decode and check that the payload matches the command tag
    pub fn decode(command: Command, bytes: &[u8]) -> Result<Self, Error> {
        let tx = FormTransaction::from_json(bytes)?;
        if tx.command() != command {
            return Err(Error::CommandMismatch {
                command,
                payload: tx.command(),
            });
        }
        Ok(tx)
    }
}
