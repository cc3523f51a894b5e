/// Card edit draft: the state behind the card editor.
///
/// Edits stay local to the draft until committed as a single
/// `UpdateCard` mutation.
use crate::store::{BoardError, BoardMutation, BoardStateStore};
use crate::types::{Card, Settings};

#[derive(Debug, Clone, PartialEq)]
pub struct CardDraft {
    card_id: String,
    pub content: String,
    pub description: String,
    labels: Vec<String>,
    members: Vec<String>,
}

impl CardDraft {
    pub fn from_card(card: &Card) -> Self {
        Self {
            card_id: card.id.clone(),
            content: card.content.clone(),
            description: card.description.clone(),
            labels: card.labels.clone(),
            members: card.members.clone(),
        }
    }

    /// Start editing a card of the current board.
    pub fn open(store: &BoardStateStore, card_id: &str) -> Result<Self, BoardError> {
        store
            .card(card_id)
            .map(Self::from_card)
            .ok_or_else(|| BoardError::CardNotFound(card_id.to_string()))
    }

    pub fn card_id(&self) -> &str {
        &self.card_id
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn has_label(&self, label_id: &str) -> bool {
        self.labels.iter().any(|id| id == label_id)
    }

    pub fn has_member(&self, member_id: &str) -> bool {
        self.members.iter().any(|id| id == member_id)
    }

    /// Returns whether the label is selected afterwards.
    pub fn toggle_label(&mut self, label_id: &str) -> bool {
        toggle(&mut self.labels, label_id)
    }

    /// Returns whether the member is assigned afterwards.
    pub fn toggle_member(&mut self, member_id: &str) -> bool {
        toggle(&mut self.members, member_id)
    }

    /// Drop selections whose label or member no longer exists in `settings`.
    /// Returns whether anything was dropped.
    pub fn refresh(&mut self, settings: &Settings) -> bool {
        let before = self.labels.len() + self.members.len();
        self.labels.retain(|id| settings.label(id).is_some());
        self.members.retain(|id| settings.member(id).is_some());
        before != self.labels.len() + self.members.len()
    }

    pub fn commit(self) -> BoardMutation {
        BoardMutation::UpdateCard {
            card_id: self.card_id,
            content: self.content,
            description: self.description,
            labels: self.labels,
            members: self.members,
        }
    }
}

fn toggle(selection: &mut Vec<String>, id: &str) -> bool {
    match selection.iter().position(|s| s == id) {
        Some(pos) => {
            selection.remove(pos);
            false
        }
        None => {
            selection.push(id.to_string());
            true
        }
    }
}
