use crate::*;
use std::collections::HashSet;
use std::fmt::Write;

/// A decoded plaintext ballot.
///
/// Answers are held in parallel lists per question kind: `select_result_ids[i]`
/// is the question answered by `select_result[i]`. The default value is the
/// empty "tombstone" ballot, used in place of a ballot that failed to decode.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Ballot {
    #[serde(rename = "SelectResultIDs")]
    pub select_result_ids: Vec<String>,
    pub select_result: Vec<Vec<bool>>,

    #[serde(rename = "RankResultIDs")]
    pub rank_result_ids: Vec<String>,
    pub rank_result: Vec<Vec<Option<i8>>>,

    #[serde(rename = "TextResultIDs")]
    pub text_result_ids: Vec<String>,
    pub text_result: Vec<Vec<String>>,
}

impl Ballot {
    /// Parse an encoded ballot and validate it against the form's configuration
    pub fn parse(encoded: &[u8], config: &Configuration, ballot_size: usize) -> Result<Self, Error> {
        if encoded.len() > ballot_size {
            return Err(Error::BallotTooLarge {
                size: encoded.len(),
                max: ballot_size,
            });
        }

        let encoded = std::str::from_utf8(encoded)
            .map_err(|_| Error::InvalidBallot("ballot is not valid UTF-8".to_owned()))?;

        let mut ballot = Ballot::default();
        let mut answered = HashSet::new();

        for line in encoded.split('\n') {
            if line.is_empty() {
                continue;
            }

            let mut parts = line.splitn(3, ':');
            let (kind, qid, payload) = match (parts.next(), parts.next(), parts.next()) {
                (Some(kind), Some(qid), Some(payload)) => (kind, qid, payload),
                _ => return Err(invalid(format!("malformed line {:?}", line))),
            };

            if !answered.insert(qid) {
                return Err(invalid(format!("question {} is answered twice", qid)));
            }

            let question = config
                .get_question(qid)
                .ok_or_else(|| invalid(format!("unknown question {}", qid)))?;

            match (kind, question) {
                ("select", Question::Select(select)) => {
                    let result = parse_select(payload, select)?;
                    ballot.select_result_ids.push(qid.to_owned());
                    ballot.select_result.push(result);
                }
                ("rank", Question::Rank(rank)) => {
                    let result = parse_rank(payload, rank)?;
                    ballot.rank_result_ids.push(qid.to_owned());
                    ballot.rank_result.push(result);
                }
                ("text", Question::Text(text)) => {
                    let result = parse_text(payload, text)?;
                    ballot.text_result_ids.push(qid.to_owned());
                    ballot.text_result.push(result);
                }
                _ => {
                    return Err(invalid(format!(
                        "question {} is not of kind {}",
                        qid, kind
                    )))
                }
            }
        }

        Ok(ballot)
    }

    /// Parse an untrusted decrypted ballot, falling back to the tombstone
    pub fn parse_or_tombstone(encoded: &[u8], config: &Configuration, ballot_size: usize) -> Self {
        match Ballot::parse(encoded, config, ballot_size) {
            Ok(ballot) => ballot,
            Err(e) => {
                log::debug!("ballot replaced by an empty ballot: {}", e);
                Ballot::default()
            }
        }
    }

    /// Encode the ballot: one line per answer, then a terminating newline
    pub fn marshal(&self) -> String {
        let mut out = String::new();

        for (id, result) in self.select_result_ids.iter().zip(&self.select_result) {
            let payload: Vec<&str> = result
                .iter()
                .map(|b| if *b { "true" } else { "false" })
                .collect();
            let _ = writeln!(out, "select:{}:{}", id, payload.join(","));
        }

        for (id, result) in self.rank_result_ids.iter().zip(&self.rank_result) {
            let payload: Vec<String> = result
                .iter()
                .map(|r| r.map(|r| r.to_string()).unwrap_or_default())
                .collect();
            let _ = writeln!(out, "rank:{}:{}", id, payload.join(","));
        }

        for (id, result) in self.text_result_ids.iter().zip(&self.text_result) {
            let payload: Vec<String> = result.iter().map(base64::encode).collect();
            let _ = writeln!(out, "text:{}:{}", id, payload.join(","));
        }

        out.push('\n');
        out
    }

    /// True for the empty ballot left by a decoding failure
    pub fn is_tombstone(&self) -> bool {
        *self == Ballot::default()
    }

    pub fn select(&self, id: &str) -> Option<&[bool]> {
        self.select_result_ids
            .iter()
            .position(|i| i == id)
            .map(|i| self.select_result[i].as_slice())
    }

    pub fn rank(&self, id: &str) -> Option<&[Option<i8>]> {
        self.rank_result_ids
            .iter()
            .position(|i| i == id)
            .map(|i| self.rank_result[i].as_slice())
    }

    pub fn text(&self, id: &str) -> Option<&[String]> {
        self.text_result_ids
            .iter()
            .position(|i| i == id)
            .map(|i| self.text_result[i].as_slice())
    }
}

fn invalid(msg: String) -> Error {
    Error::InvalidBallot(msg)
}

fn check_count(qid: &str, count: usize, min_n: usize, max_n: usize) -> Result<(), Error> {
    if count < min_n || count > max_n {
        return Err(invalid(format!(
            "question {} has {} answers, expected between {} and {}",
            qid, count, min_n, max_n
        )));
    }
    Ok(())
}

fn check_len(qid: &str, found: usize, expected: usize) -> Result<(), Error> {
    if found != expected {
        return Err(invalid(format!(
            "question {} has {} entries, expected {}",
            qid, found, expected
        )));
    }
    Ok(())
}

fn parse_select(payload: &str, select: &Select) -> Result<Vec<bool>, Error> {
    let result = payload
        .split(',')
        .map(|v| match v {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(invalid(format!(
                "select {} has a non-boolean value {:?}",
                select.id, other
            ))),
        })
        .collect::<Result<Vec<bool>, Error>>()?;

    check_len(&select.id, result.len(), select.choices.len())?;
    let count = result.iter().filter(|b| **b).count();
    check_count(&select.id, count, select.min_n, select.max_n)?;

    Ok(result)
}

fn parse_rank(payload: &str, rank: &Rank) -> Result<Vec<Option<i8>>, Error> {
    let mut result = Vec::new();
    let mut seen = HashSet::new();

    for v in payload.split(',') {
        if v.is_empty() {
            result.push(None);
            continue;
        }

        let position: i8 = v.parse().map_err(|_| {
            invalid(format!("rank {} has a non-integer value {:?}", rank.id, v))
        })?;

        if position < 0 || position as usize >= rank.max_n {
            return Err(invalid(format!(
                "rank {} has value {} outside of [0, {})",
                rank.id, position, rank.max_n
            )));
        }
        if !seen.insert(position) {
            return Err(invalid(format!(
                "rank {} uses value {} twice",
                rank.id, position
            )));
        }

        result.push(Some(position));
    }

    check_len(&rank.id, result.len(), rank.choices.len())?;
    check_count(&rank.id, seen.len(), rank.min_n, rank.max_n)?;

    Ok(result)
}

fn parse_text(payload: &str, text: &Text) -> Result<Vec<String>, Error> {
    let mut result = Vec::new();

    for v in payload.split(',') {
        let decoded = base64::decode(v)
            .map_err(|e| invalid(format!("text {} is not valid base64: {}", text.id, e)))?;

        if decoded.len() > text.max_length {
            return Err(invalid(format!(
                "text {} has an answer of {} bytes, maximum is {}",
                text.id,
                decoded.len(),
                text.max_length
            )));
        }

        let answer = String::from_utf8(decoded)
            .map_err(|_| invalid(format!("text {} is not valid UTF-8", text.id)))?;
        result.push(answer);
    }

    check_len(&text.id, result.len(), text.choices.len())?;
    let count = result.iter().filter(|t| !t.is_empty()).count();
    check_count(&text.id, count, text.min_n, text.max_n)?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Configuration {
        Configuration {
            main_title: "Ballot".to_owned(),
            scaffold: vec![Subject {
                id: "c3Viag==".to_owned(),
                title: "Subject".to_owned(),
                selects: vec![Select {
                    id: "c2Vs".to_owned(),
                    title: "Pick".to_owned(),
                    max_n: 2,
                    min_n: 1,
                    choices: vec!["a".into(), "b".into(), "c".into()],
                }],
                ranks: vec![Rank {
                    id: "cmFuaw==".to_owned(),
                    title: "Order".to_owned(),
                    max_n: 3,
                    min_n: 2,
                    choices: vec!["x".into(), "y".into(), "z".into()],
                }],
                texts: vec![Text {
                    id: "dGV4dA==".to_owned(),
                    title: "Write".to_owned(),
                    max_n: 2,
                    min_n: 1,
                    max_length: 6,
                    choices: vec!["first".into(), "last".into()],
                }],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn parse_and_marshal() {
        let cfg = config();
        let size = cfg.max_ballot_size();

        let encoded = format!(
            "select:c2Vs:true,false,true\nrank:cmFuaw==:1,,0\ntext:dGV4dA==:{},\n\n",
            base64::encode("Alice")
        );

        let ballot = Ballot::parse(encoded.as_bytes(), &cfg, size).unwrap();
        assert_eq!(ballot.select("c2Vs").unwrap(), &[true, false, true]);
        assert_eq!(ballot.rank("cmFuaw==").unwrap(), &[Some(1), None, Some(0)]);
        assert_eq!(
            ballot.text("dGV4dA==").unwrap(),
            &["Alice".to_owned(), "".to_owned()]
        );

        assert_eq!(ballot.marshal(), encoded);
        assert!(ballot.marshal().len() <= size);
    }

    #[test]
    fn reparse_is_stable() {
        let cfg = config();
        let size = cfg.max_ballot_size();

        let inputs: Vec<&[u8]> = vec![
            b"rank:cmFuaw==:0,1,2\nselect:c2Vs:false,true,false",
            b"select:c2Vs:true,true,true\n",
            b"garbage",
            b"\n\n\n",
            b"",
        ];

        for input in inputs {
            let first = Ballot::parse_or_tombstone(input, &cfg, size);
            let second = Ballot::parse_or_tombstone(first.marshal().as_bytes(), &cfg, size);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn rejects_invalid_ballots() {
        let cfg = config();
        let size = cfg.max_ballot_size();

        let cases: Vec<&[u8]> = vec![
            // Too many selected
            b"select:c2Vs:true,true,true\n",
            // None selected
            b"select:c2Vs:false,false,false\n",
            // Wrong number of choices
            b"select:c2Vs:true,false,false,false\n",
            // Not a boolean
            b"select:c2Vs:yes,false,false\n",
            // Rank out of range
            b"rank:cmFuaw==:3,1,\n",
            // Duplicate rank
            b"rank:cmFuaw==:1,1,\n",
            // Too few ranked
            b"rank:cmFuaw==:1,,\n",
            // Negative rank
            b"rank:cmFuaw==:-1,0,\n",
            // Invalid base64
            b"text:dGV4dA==:!!!!,\n",
            // Answer too long
            b"text:dGV4dA==:VG9vIGxvbmcgYW5zd2Vy,\n",
            // Unknown question
            b"select:bm9wZQ==:true\n",
            // Wrong kind
            b"rank:c2Vs:true,false,false\n",
            // Answered twice
            b"select:c2Vs:true,false,false\nselect:c2Vs:true,false,false\n",
            // Missing payload
            b"select:c2Vs\n",
            // Not UTF-8
            &[0xff, 0xfe, b'\n'],
        ];

        for case in cases {
            assert!(
                Ballot::parse(case, &cfg, size).is_err(),
                "accepted {:?}",
                String::from_utf8_lossy(case)
            );
            assert!(Ballot::parse_or_tombstone(case, &cfg, size).is_tombstone());
        }

        let too_large = vec![b'\n'; size + 1];
        assert!(matches!(
            Ballot::parse(&too_large, &cfg, size),
            Err(Error::BallotTooLarge { .. })
        ));
    }

    #[test]
    fn longest_ballot_fits() {
        let cfg = config();
        let size = cfg.max_ballot_size();

        let encoded = format!(
            "select:c2Vs:false,false,false\nrank:cmFuaw==:2,1,0\ntext:dGV4dA==:{},{}\n\n",
            base64::encode("sixsix"),
            base64::encode("six666")
        );
        // An impossible select still measures the worst case for selects
        assert!(encoded.len() <= size);

        let valid = format!(
            "select:c2Vs:false,true,false\nrank:cmFuaw==:2,1,0\ntext:dGV4dA==:{},{}\n\n",
            base64::encode("sixsix"),
            base64::encode("six666")
        );
        Ballot::parse(valid.as_bytes(), &cfg, size).unwrap();
    }

    #[test]
    fn ballot_size_is_the_longest_encoding() {
        let mut cfg = config();
        cfg.scaffold[0].ranks.clear();
        cfg.scaffold[0].selects[0].min_n = 0;
        let size = cfg.max_ballot_size();

        let longest = Ballot {
            select_result_ids: vec!["c2Vs".to_owned()],
            select_result: vec![vec![false, false, false]],
            text_result_ids: vec!["dGV4dA==".to_owned()],
            text_result: vec![vec!["sixsix".to_owned(), "six666".to_owned()]],
            ..Default::default()
        };
        let encoded = longest.marshal();
        assert_eq!(encoded.len(), size);
        assert_eq!(Ballot::parse(encoded.as_bytes(), &cfg, size).unwrap(), longest);
    }
}
