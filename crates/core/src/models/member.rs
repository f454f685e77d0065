use std::{collections::BTreeSet, fmt};

use crate::codec::MEMBER_ROW;

use super::HELD_DELIMITER;

/// A borrower and the ids of the items they currently hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    id: String,
    name: String,
    held: BTreeSet<String>,
}

impl Member {
    /// Create a member holding nothing.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            held: BTreeSet::new(),
        }
    }

    /// Member id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ids of items currently on loan to this member.
    pub fn held(&self) -> &BTreeSet<String> {
        &self.held
    }

    /// Whether this member currently holds `item_id`.
    pub fn holds(&self, item_id: &str) -> bool {
        self.held.contains(item_id)
    }

    pub(crate) fn hold(&mut self, item_id: &str) -> bool {
        self.held.insert(item_id.to_string())
    }

    pub(crate) fn release(&mut self, item_id: &str) -> bool {
        self.held.remove(item_id)
    }

    /// Fields of this member's persisted row; held ids are joined into one field.
    pub fn to_record(&self) -> Vec<String> {
        let held = self
            .held
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(HELD_DELIMITER);
        vec![
            MEMBER_ROW.to_string(),
            self.id.clone(),
            self.name.clone(),
            held,
        ]
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Member ID: {}, Name: {}, Books Borrowed: {}",
            self.id,
            self.name,
            self.held.len()
        )
    }
}
