use crate::*;
use indexmap::IndexMap;
use std::sync::Mutex;

/// Gauges describing one form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormGauges {
    pub status: FormStatus,
    pub ballot_count: usize,
    pub shuffle_count: usize,
    pub pubshares_count: usize,
}

impl From<&Form> for FormGauges {
    fn from(form: &Form) -> Self {
        FormGauges {
            status: form.status,
            ballot_count: form.ballot_count,
            shuffle_count: form.shuffle_instances.len(),
            pubshares_count: form.pubshares_units.len(),
        }
    }
}

/// Receives form gauges after every successful form mutation
pub trait Metrics {
    fn form_updated(&self, form_id: &str, gauges: FormGauges);

    fn form_deleted(&self, form_id: &str);
}

/// Discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetrics;

impl Metrics for NoMetrics {
    fn form_updated(&self, _: &str, _: FormGauges) {}

    fn form_deleted(&self, _: &str) {}
}

/// Keeps the latest gauges of every form in memory
#[derive(Debug, Default)]
pub struct MemMetrics {
    forms: Mutex<IndexMap<String, FormGauges>>,
}

impl MemMetrics {
    pub fn get(&self, form_id: &str) -> Option<FormGauges> {
        self.forms.lock().ok()?.get(form_id).copied()
    }
}

impl Metrics for MemMetrics {
    fn form_updated(&self, form_id: &str, gauges: FormGauges) {
        if let Ok(mut forms) = self.forms.lock() {
            forms.insert(form_id.to_owned(), gauges);
        }
    }

    fn form_deleted(&self, form_id: &str) {
        if let Ok(mut forms) = self.forms.lock() {
            forms.remove(form_id);
        }
    }
}
