use dvoting::*;
use dvoting_node::*;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use tallystick::approval::DefaultApprovalTally;

pub fn command_simulate(matches: &clap::ArgMatches) {
    let nodes = parse_count(matches, "nodes", 1);
    let voters = parse_count(matches, "voters", 2);

    let configuration = match matches.value_of("config") {
        Some(filename) => crate::read_configuration("simulate", filename),
        None => default_configuration(),
    };
    if let Err(e) = configuration.validate() {
        eprintln!("dvoting simulate: {}", e);
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("dvoting simulate: unable to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let form = match runtime.block_on(simulate(configuration, nodes, voters)) {
        Ok(form) => form,
        Err(e) => {
            eprintln!("dvoting simulate: {}", e);
            std::process::exit(1);
        }
    };

    println!("> Form {} reached {:?}", form.form_id, form.status);

    if matches.is_present("print-ballots") {
        println!("Ballots:");
        for ballot in &form.decrypted_ballots {
            if ballot.is_tombstone() {
                println!("  (invalid ballot)");
            } else {
                print!("{}", indent(&ballot.marshal()));
            }
        }
    }

    println!("Tally:");
    for select in selects(&form.configuration.scaffold) {
        println!("  {}", select.title);

        let mut tally = DefaultApprovalTally::<String>::new(std::cmp::max(select.max_n, 1));
        for ballot in &form.decrypted_ballots {
            if let Some(result) = ballot.select(&select.id) {
                let approved: Vec<String> = select
                    .choices
                    .iter()
                    .zip(result)
                    .filter(|(_, chosen)| **chosen)
                    .map(|(choice, _)| choice.clone())
                    .collect();
                tally.add_ref(&approved);
            }
        }

        for (choice, num_votes) in tally.totals().iter() {
            println!("    {} got {} votes", choice, num_votes);
        }
    }
}

fn parse_count(matches: &clap::ArgMatches, name: &str, min: usize) -> usize {
    let value = matches.value_of(name).unwrap_or_default();
    match value.parse::<usize>() {
        Ok(n) if n >= min => n,
        _ => {
            eprintln!(
                "dvoting simulate: --{} must be a number of at least {}, got {:?}",
                name, min, value
            );
            std::process::exit(1);
        }
    }
}

/// Run a form from creation to its result on an in-memory ledger
async fn simulate(
    configuration: Configuration,
    num_nodes: usize,
    num_voters: usize,
) -> Result<Form, String> {
    let ledger = Arc::new(MemLedger::new(Contract::default()));

    let nodes = (0..num_nodes)
        .map(|_| NodeKeys::generate().map(Arc::new))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;
    let roster = Roster::new(
        nodes
            .iter()
            .enumerate()
            .map(|(i, keys)| RosterNode {
                address: format!("127.0.0.1:{}", 2000 + i),
                public_key: keys.signer.public_key(),
            })
            .collect(),
    );
    ledger.store_roster(&roster).map_err(|e| e.to_string())?;
    log::info!("roster of {} nodes stored", num_nodes);

    let (client, _) = generate_keypair();
    let admin = "admin".to_owned();

    let id = submit(
        &ledger,
        &client,
        FormTransaction::CreateForm(CreateForm {
            configuration: configuration.clone(),
            admin_id: admin.clone(),
        }),
    )?;
    let form_id = hex::encode(sha256(&id.0));

    let mut rng = rand::rngs::OsRng {};
    let shares: Vec<Arc<DkgShare>> = run_dkg(&mut rng, num_nodes)
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(Arc::new)
        .collect();
    let public_key = shares[0].public_key();
    ledger
        .publish_dkg_key(&form_id, &public_key)
        .map_err(|e| e.to_string())?;

    submit(
        &ledger,
        &client,
        FormTransaction::OpenForm(OpenForm {
            form_id: form_id.clone(),
        }),
    )?;

    let chunks = configuration.chunks_per_ballot();
    for i in 0..num_voters {
        let encoded = random_ballot(&mut rng, &configuration).marshal();
        let ballot = shares[0]
            .encrypt(&mut rng, encoded.as_bytes(), chunks)
            .map_err(|e| e.to_string())?;

        submit(
            &ledger,
            &client,
            FormTransaction::CastVote(CastVote {
                form_id: form_id.clone(),
                user_id: format!("voter{}", i),
                ballot,
            }),
        )?;
    }
    log::info!("{} ballots cast", num_voters);

    let action = FormAction {
        form_id: form_id.clone(),
        user_id: admin,
    };
    submit(&ledger, &client, FormTransaction::CloseForm(action.clone()))?;

    let options = ActorOptions::default();

    let shufflers: Vec<_> = nodes
        .iter()
        .map(|keys| {
            let actor = ShuffleActor::new(ledger.clone(), keys.clone(), options);
            let form_id = form_id.clone();
            tokio::spawn(async move { actor.shuffle(&form_id).await })
        })
        .collect();
    for handle in shufflers {
        handle
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())?;
    }

    let publishers: Vec<_> = nodes
        .iter()
        .zip(&shares)
        .map(|(keys, share)| {
            let actor = PubsharesActor::new(ledger.clone(), keys.clone(), share.clone(), options);
            let form_id = form_id.clone();
            tokio::spawn(async move { actor.compute_pubshares(&form_id).await })
        })
        .collect();
    for handle in publishers {
        handle
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())?;
    }

    submit(&ledger, &client, FormTransaction::CombineShares(action))?;

    ledger.form(&form_id).map_err(|e| e.to_string())
}

/// Submit a client transaction and return its ID once accepted
fn submit(
    ledger: &MemLedger,
    client: &ed25519_dalek::SecretKey,
    tx: FormTransaction,
) -> Result<TxId, String> {
    let public = ed25519_dalek::PublicKey::from(client);
    let nonce = ledger.nonce(&public).map_err(|e| e.to_string())?;
    let ledger_tx = LedgerTransaction::form(client, nonce, &tx).map_err(|e| e.to_string())?;

    // The ledger commits on add, so the outcome is already broadcast when it returns
    let mut events = ledger.watch();
    let id = ledger.add(ledger_tx).map_err(|e| e.to_string())?;

    loop {
        match events.try_recv() {
            Ok(event) if event.id == id => {
                return event
                    .result
                    .map(|_| id)
                    .map_err(|reason| format!("transaction {} rejected: {}", id, reason))
            }
            Ok(_) => continue,
            Err(e) => return Err(format!("no outcome for transaction {}: {}", id, e)),
        }
    }
}

/// A valid ballot with random answers
fn random_ballot<R: Rng>(rng: &mut R, configuration: &Configuration) -> Ballot {
    let mut ballot = Ballot::default();
    let mut subjects: Vec<&Subject> = configuration.scaffold.iter().collect();

    while let Some(subject) = subjects.pop() {
        for select in &subject.selects {
            let picked = pick(rng, select.choices.len(), select.min_n, select.max_n);
            let mut result = vec![false; select.choices.len()];
            for i in picked {
                result[i] = true;
            }
            ballot.select_result_ids.push(select.id.clone());
            ballot.select_result.push(result);
        }

        for rank in &subject.ranks {
            let picked = pick(rng, rank.choices.len(), rank.min_n, rank.max_n);
            let mut result = vec![None; rank.choices.len()];
            for (position, i) in picked.into_iter().enumerate() {
                result[i] = Some(position as i8);
            }
            ballot.rank_result_ids.push(rank.id.clone());
            ballot.rank_result.push(result);
        }

        for text in &subject.texts {
            let picked = pick(rng, text.choices.len(), text.min_n, text.max_n);
            let answer: String = "answer".chars().take(text.max_length).collect();
            let mut result = vec![String::new(); text.choices.len()];
            for i in picked {
                result[i] = answer.clone();
            }
            ballot.text_result_ids.push(text.id.clone());
            ballot.text_result.push(result);
        }

        subjects.extend(subject.subjects.iter());
    }

    ballot
}

/// Between `min_n` and `max_n` distinct indexes below `len`, in random order
fn pick<R: Rng>(rng: &mut R, len: usize, min_n: usize, max_n: usize) -> Vec<usize> {
    let count = rng.gen_range(min_n, max_n + 1);
    let mut indexes: Vec<usize> = (0..len).collect();
    indexes.shuffle(rng);
    indexes.truncate(count);
    indexes
}

fn selects(subjects: &[Subject]) -> Vec<&Select> {
    subjects
        .iter()
        .flat_map(|s| s.selects.iter().chain(selects(&s.subjects)))
        .collect()
}

fn indent(text: &str) -> String {
    text.lines()
        .filter(|l| !l.is_empty())
        .map(|l| format!("  {}\n", l))
        .collect()
}

fn default_configuration() -> Configuration {
    Configuration {
        main_title: "Simulated form".to_owned(),
        scaffold: vec![Subject {
            id: "c3ViamVjdA==".to_owned(),
            title: "Board".to_owned(),
            order: vec!["Ym9hcmQ=".to_owned()],
            selects: vec![Select {
                id: "Ym9hcmQ=".to_owned(),
                title: "Board members".to_owned(),
                max_n: 2,
                min_n: 1,
                choices: vec!["ada".into(), "grace".into(), "edsger".into()],
            }],
            ..Default::default()
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ballots_are_valid() {
        let mut configuration = default_configuration();
        configuration.scaffold[0].subjects.push(Subject {
            id: "aW5uZXI=".to_owned(),
            title: "Inner".to_owned(),
            ranks: vec![Rank {
                id: "cmFuaw==".to_owned(),
                title: "Order".to_owned(),
                max_n: 3,
                min_n: 2,
                choices: vec!["a".into(), "b".into(), "c".into()],
            }],
            texts: vec![Text {
                id: "dGV4dA==".to_owned(),
                title: "Comments".to_owned(),
                max_n: 1,
                min_n: 1,
                max_length: 3,
                choices: vec!["first".into(), "second".into()],
            }],
            ..Default::default()
        });
        configuration.validate().unwrap();

        let mut rng = rand::rngs::OsRng {};
        for _ in 0..20 {
            let ballot = random_ballot(&mut rng, &configuration);
            let encoded = ballot.marshal();
            let parsed = Ballot::parse(
                encoded.as_bytes(),
                &configuration,
                configuration.max_ballot_size(),
            )
            .unwrap();
            assert_eq!(parsed.select("Ym9hcmQ="), ballot.select("Ym9hcmQ="));
            assert_eq!(parsed.text("dGV4dA==").unwrap().len(), 2);
        }
    }

    #[test]
    fn nested_selects_are_found() {
        let mut configuration = default_configuration();
        let inner = configuration.scaffold[0].clone();
        configuration.scaffold[0].subjects.push(Subject {
            id: "aW5uZXI=".to_owned(),
            selects: vec![Select {
                id: "c2Vjb25k".to_owned(),
                ..inner.selects[0].clone()
            }],
            ..Default::default()
        });

        let ids: Vec<&str> = selects(&configuration.scaffold)
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["Ym9hcmQ=", "c2Vjb25k"]);
    }
}
