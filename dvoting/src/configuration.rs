use crate::*;
use std::collections::HashSet;

/// Capacity of a rank question: ranks are encoded as `i8` values in `[0, max_n)`
pub const MAX_RANK_CHOICES: usize = 128;

/// The immutable description of a form: a title and a tree of subjects
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Configuration {
    pub main_title: String,
    pub scaffold: Vec<Subject>,
}

/// A group of questions, possibly nested
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Subject {
    #[serde(rename = "ID")]
    pub id: String,
    pub title: String,

    /// Display order of the children, by ID
    #[serde(default)]
    pub order: Vec<String>,

    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub selects: Vec<Select>,
    #[serde(default)]
    pub ranks: Vec<Rank>,
    #[serde(default)]
    pub texts: Vec<Text>,
}

/// k-of-n checkboxes
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Select {
    #[serde(rename = "ID")]
    pub id: String,
    pub title: String,
    pub max_n: usize,
    pub min_n: usize,
    pub choices: Vec<String>,
}

/// An ordering over n choices, blank entries allowed
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Rank {
    #[serde(rename = "ID")]
    pub id: String,
    pub title: String,
    pub max_n: usize,
    pub min_n: usize,
    pub choices: Vec<String>,
}

/// n free-form answers
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Text {
    #[serde(rename = "ID")]
    pub id: String,
    pub title: String,
    pub max_n: usize,
    pub min_n: usize,

    /// Maximum length of one answer, in bytes
    pub max_length: usize,
    pub choices: Vec<String>,
}

/// A borrowed question of any kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Question<'a> {
    Select(&'a Select),
    Rank(&'a Rank),
    Text(&'a Text),
}

impl Configuration {
    /// Check that the configuration describes a well-formed form
    pub fn validate(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        let mut questions = 0;

        for subject in &self.scaffold {
            subject.validate(&mut seen, &mut questions)?;
        }

        if questions == 0 {
            return Err(Error::InvalidConfiguration(
                "configuration has no questions".to_owned(),
            ));
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Find a question anywhere in the tree
    pub fn get_question(&self, id: &str) -> Option<Question> {
        self.scaffold.iter().find_map(|s| s.get_question(id))
    }

    /// The byte length of the longest ballot the parser accepts
    pub fn max_ballot_size(&self) -> usize {
        let size: usize = self.scaffold.iter().map(Subject::max_encoded_size).sum();

        // Terminating newline
        if size > 0 {
            size + 1
        } else {
            0
        }
    }

    /// Number of ElGamal pairs in every ciphervote of this form
    pub fn chunks_per_ballot(&self) -> usize {
        chunks_for_size(self.max_ballot_size())
    }
}

/// Number of points needed to embed `size` bytes
pub fn chunks_for_size(size: usize) -> usize {
    (size + EMBED_LEN - 1) / EMBED_LEN
}

impl Subject {
    fn validate(&self, seen: &mut HashSet<String>, questions: &mut usize) -> Result<(), Error> {
        check_id(&self.id, seen)?;

        let mut children = HashSet::new();

        for select in &self.selects {
            check_id(&select.id, seen)?;
            check_bounds(&select.id, select.min_n, select.max_n, select.choices.len())?;
            children.insert(select.id.as_str());
            *questions += 1;
        }

        for rank in &self.ranks {
            check_id(&rank.id, seen)?;
            check_bounds(&rank.id, rank.min_n, rank.max_n, rank.choices.len())?;
            if rank.choices.len() > MAX_RANK_CHOICES {
                return Err(Error::InvalidConfiguration(format!(
                    "rank {} has more than {} choices",
                    rank.id, MAX_RANK_CHOICES
                )));
            }
            children.insert(rank.id.as_str());
            *questions += 1;
        }

        for text in &self.texts {
            check_id(&text.id, seen)?;
            check_bounds(&text.id, text.min_n, text.max_n, text.choices.len())?;
            if text.max_length == 0 {
                return Err(Error::InvalidConfiguration(format!(
                    "text {} has a zero max length",
                    text.id
                )));
            }
            children.insert(text.id.as_str());
            *questions += 1;
        }

        for subject in &self.subjects {
            subject.validate(seen, questions)?;
            children.insert(subject.id.as_str());
        }

        for id in &self.order {
            if !children.contains(id.as_str()) {
                return Err(Error::InvalidConfiguration(format!(
                    "subject {} orders unknown element {}",
                    self.id, id
                )));
            }
        }

        Ok(())
    }

    fn get_question(&self, id: &str) -> Option<Question> {
        if let Some(s) = self.selects.iter().find(|s| s.id == id) {
            return Some(Question::Select(s));
        }
        if let Some(r) = self.ranks.iter().find(|r| r.id == id) {
            return Some(Question::Rank(r));
        }
        if let Some(t) = self.texts.iter().find(|t| t.id == id) {
            return Some(Question::Text(t));
        }
        self.subjects.iter().find_map(|s| s.get_question(id))
    }

    fn max_encoded_size(&self) -> usize {
        let mut size = 0;

        // Each choice is at most "false", comma separated, and the line ends in a newline
        for select in &self.selects {
            size += "select:".len() + select.id.len() + 1;
            size += payload_size(select.choices.len(), "false".len());
        }

        // Each choice is at most "127"
        for rank in &self.ranks {
            size += "rank:".len() + rank.id.len() + 1;
            size += payload_size(rank.choices.len(), "127".len());
        }

        // Each choice is at most a base64 encoding of max_length bytes
        for text in &self.texts {
            size += "text:".len() + text.id.len() + 1;
            size += payload_size(text.choices.len(), 4 * ((text.max_length + 2) / 3));
        }

        size + self
            .subjects
            .iter()
            .map(Subject::max_encoded_size)
            .sum::<usize>()
    }
}

/// Longest "a,b,c\n" line payload for `n` answers of at most `width` bytes
fn payload_size(n: usize, width: usize) -> usize {
    match n {
        0 => 1,
        n => n * (width + 1),
    }
}

fn check_id(id: &str, seen: &mut HashSet<String>) -> Result<(), Error> {
    if id.is_empty() || base64::decode(id).is_err() {
        return Err(Error::InvalidConfiguration(format!(
            "ID {:?} is not valid base64",
            id
        )));
    }
    if !seen.insert(id.to_owned()) {
        return Err(Error::InvalidConfiguration(format!(
            "ID {} is used more than once",
            id
        )));
    }
    Ok(())
}

fn check_bounds(id: &str, min_n: usize, max_n: usize, choices: usize) -> Result<(), Error> {
    if min_n > max_n || max_n > choices {
        return Err(Error::InvalidConfiguration(format!(
            "question {} needs min <= max <= choices, found {} <= {} <= {}",
            id, min_n, max_n, choices
        )));
    }
    Ok(())
}
