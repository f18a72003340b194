use super::*;
use dvoting::*;
use std::sync::Arc;
use std::time::Duration;

/// A roster of nodes sharing one in-memory ledger, with a key generated for one form
struct Network {
    ledger: Arc<MemLedger>,
    nodes: Vec<Arc<NodeKeys>>,
    client: ed25519_dalek::SecretKey,
    options: ActorOptions,
}

impl Network {
    fn new(roster_len: usize, ledger: MemLedger) -> Self {
        let nodes: Vec<Arc<NodeKeys>> = (0..roster_len)
            .map(|_| Arc::new(NodeKeys::generate().unwrap()))
            .collect();

        let roster = Roster::new(
            nodes
                .iter()
                .enumerate()
                .map(|(i, n)| RosterNode {
                    address: format!("127.0.0.1:{}", 2000 + i),
                    public_key: n.signer.public_key(),
                })
                .collect(),
        );
        ledger.store_roster(&roster).unwrap();

        let (client, _) = generate_keypair();

        Network {
            ledger: Arc::new(ledger),
            nodes,
            client,
            options: ActorOptions {
                inclusion_timeout: Duration::from_millis(500),
                max_retries: 10,
            },
        }
    }

    fn submit(&self, tx: FormTransaction) -> TxEvent {
        let mut events = self.ledger.watch();
        let public = ed25519_dalek::PublicKey::from(&self.client);
        let nonce = self.ledger.nonce(&public).unwrap();
        let id = self
            .ledger
            .add(LedgerTransaction::form(&self.client, nonce, &tx).unwrap())
            .unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.id, id);
        event
    }

    /// Create and open a form whose key the roster generated together
    fn open_form(&self) -> (String, Vec<Arc<DkgShare>>) {
        let create = FormTransaction::CreateForm(CreateForm {
            configuration: configuration(),
            admin_id: "admin".to_owned(),
        });
        let event = self.submit(create);
        assert!(event.accepted());
        let form_id = hex::encode(sha256(&event.id.0));

        let mut rng = rand::rngs::OsRng {};
        let shares: Vec<Arc<DkgShare>> = run_dkg(&mut rng, self.nodes.len())
            .unwrap()
            .into_iter()
            .map(Arc::new)
            .collect();
        self.ledger
            .publish_dkg_key(&form_id, &shares[0].public_key())
            .unwrap();

        let event = self.submit(FormTransaction::OpenForm(OpenForm {
            form_id: form_id.clone(),
        }));
        assert!(event.accepted());

        (form_id, shares)
    }

    fn cast(&self, form_id: &str, share: &DkgShare, user: &str, choices: &[bool]) {
        let form = self.ledger.form(form_id).unwrap();
        let encoded = Ballot {
            select_result_ids: vec!["cTE=".to_owned()],
            select_result: vec![choices.to_vec()],
            ..Default::default()
        }
        .marshal();

        let mut rng = rand::rngs::OsRng {};
        let ballot = share
            .encrypt(&mut rng, encoded.as_bytes(), form.chunks_per_ballot())
            .unwrap();

        let event = self.submit(FormTransaction::CastVote(CastVote {
            form_id: form_id.to_owned(),
            user_id: user.to_owned(),
            ballot,
        }));
        assert!(event.accepted());
    }

    fn admin(&self, form_id: &str) -> FormAction {
        FormAction {
            form_id: form_id.to_owned(),
            user_id: "admin".to_owned(),
        }
    }
}

fn configuration() -> Configuration {
    Configuration {
        main_title: "Board election".to_owned(),
        scaffold: vec![Subject {
            id: "c3Viag==".to_owned(),
            title: "Board".to_owned(),
            order: vec!["cTE=".to_owned()],
            selects: vec![Select {
                id: "cTE=".to_owned(),
                title: "Candidates".to_owned(),
                max_n: 2,
                min_n: 1,
                choices: vec!["ada".into(), "grace".into(), "edsger".into()],
            }],
            ..Default::default()
        }],
    }
}

#[tokio::test]
async fn actors_run_a_form_to_its_result() {
    let net = Network::new(3, MemLedger::new(Contract::default()));
    let (form_id, shares) = net.open_form();

    let votes = vec![
        vec![true, false, false],
        vec![false, true, false],
        vec![true, true, false],
    ];
    for (i, vote) in votes.iter().enumerate() {
        net.cast(&form_id, &shares[0], &format!("voter{}", i), vote);
    }
    assert!(net
        .submit(FormTransaction::CloseForm(net.admin(&form_id)))
        .accepted());

    // Every node shuffles concurrently; conflicting rounds are retried
    let shufflers: Vec<_> = net
        .nodes
        .iter()
        .map(|keys| {
            let actor = ShuffleActor::new(net.ledger.clone(), keys.clone(), net.options);
            let form_id = form_id.clone();
            tokio::spawn(async move { actor.shuffle(&form_id).await })
        })
        .collect();
    for handle in shufflers {
        handle.await.unwrap().unwrap();
    }

    let form = net.ledger.form(&form_id).unwrap();
    assert_eq!(form.status, FormStatus::ShuffledBallots);
    assert_eq!(form.shuffle_instances.len(), 3);

    let publishers: Vec<_> = net
        .nodes
        .iter()
        .zip(&shares)
        .map(|(keys, share)| {
            let actor =
                PubsharesActor::new(net.ledger.clone(), keys.clone(), share.clone(), net.options);
            let form_id = form_id.clone();
            tokio::spawn(async move { actor.compute_pubshares(&form_id).await })
        })
        .collect();
    for handle in publishers {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(
        net.ledger.form(&form_id).unwrap().status,
        FormStatus::PubSharesSubmitted
    );

    assert!(net
        .submit(FormTransaction::CombineShares(net.admin(&form_id)))
        .accepted());

    let form = net.ledger.form(&form_id).unwrap();
    let mut decrypted: Vec<Vec<bool>> = form
        .decrypted_ballots
        .iter()
        .map(|b| b.select("cTE=").unwrap().to_vec())
        .collect();
    let mut expected = votes;
    decrypted.sort();
    expected.sort();
    assert_eq!(decrypted, expected);

    // Nothing left to do
    for keys in &net.nodes {
        assert_eq!(pending_task(&form, &keys.signer.public_key()), None);
    }
}

#[tokio::test]
async fn actor_gives_up_without_inclusion() {
    let net = Network::new(1, MemLedger::new(Contract::default()));
    let (form_id, shares) = net.open_form();
    net.cast(&form_id, &shares[0], "alice", &[true, false, false]);
    net.cast(&form_id, &shares[0], "bob", &[false, true, false]);
    assert!(net
        .submit(FormTransaction::CloseForm(net.admin(&form_id)))
        .accepted());

    // Same state, but a ledger that never commits
    let state = net.ledger.snapshot().unwrap();
    let stalled = Arc::new(MemLedger::manual(Contract::default()));
    stalled
        .update_state(|s| {
            for key in state.keys() {
                if let Some(value) = state.get(key)? {
                    s.set(key, value)?;
                }
            }
            Ok(())
        })
        .unwrap();

    let options = ActorOptions {
        inclusion_timeout: Duration::from_millis(20),
        max_retries: 2,
    };
    let actor = ShuffleActor::new(stalled.clone(), net.nodes[0].clone(), options);
    let err = actor.shuffle(&form_id).await.unwrap_err();
    assert!(matches!(err, NodeError::RetriesExhausted(2)));
    assert_eq!(stalled.pending().unwrap(), 2);
}

#[tokio::test]
async fn outsider_actor_is_refused() {
    let net = Network::new(1, MemLedger::new(Contract::default()));
    let (form_id, _) = net.open_form();

    let outsider = Arc::new(NodeKeys::generate().unwrap());
    let actor = ShuffleActor::new(net.ledger.clone(), outsider, net.options);
    assert!(matches!(
        actor.shuffle(&form_id).await,
        Err(NodeError::NotInRoster)
    ));
}

#[test]
fn pending_tasks_follow_the_form() {
    let net = Network::new(1, MemLedger::new(Contract::default()));
    let (form_id, _) = net.open_form();
    let key = net.nodes[0].signer.public_key();

    let form = net.ledger.form(&form_id).unwrap();
    assert_eq!(pending_task(&form, &key), None);

    let mut closed = form.clone();
    closed.status = FormStatus::Closed;
    assert_eq!(pending_task(&closed, &key), Some(Task::Shuffle));

    let mut shuffled = form;
    shuffled.status = FormStatus::ShuffledBallots;
    assert_eq!(pending_task(&shuffled, &key), Some(Task::ComputePubshares));

    let outsider = NodeSigner::generate().unwrap().public_key();
    assert_eq!(pending_task(&shuffled, &outsider), None);
}
