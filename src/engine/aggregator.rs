use crate::models::Record;
use std::collections::HashSet;

/// Records in first-discovery order, unique by `url`.
///
/// Grows only through [`ResultSet::merge`]; the first copy of a listing wins
/// even if a later page shows different values for it.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    records: Vec<Record>,
    seen: HashSet<String>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unseen records; returns how many were added
    pub fn merge(&mut self, batch: impl IntoIterator<Item = Record>) -> usize {
        let before = self.records.len();
        for record in batch {
            if self.seen.insert(record.url.clone()) {
                self.records.push(record);
            }
        }
        self.records.len() - before
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.url.as_str())
    }

}
