/// In-memory board state: the single source of truth for rendering.
///
/// Every user-driven mutation goes through [`BoardStateStore::apply`] (or the
/// matching method) and leaves the board valid: ids stay unique, a card lives
/// in exactly one column, and removing a label or member strips it from every
/// card. `replace_all` is the only entry point for remote snapshots.
use crate::ids;
use crate::template;
use crate::types::*;

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error("Card {card_id} is not in column {column_id}")]
    CardNotInColumn { card_id: String, column_id: String },

    #[error("Label not found: {0}")]
    LabelNotFound(String),

    #[error("Member not found: {0}")]
    MemberNotFound(String),
}

/// A user gesture expressed as data.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardMutation {
    CreateColumn {
        title: String,
    },
    RenameColumn {
        column_id: String,
        title: String,
    },
    DeleteColumn {
        column_id: String,
    },
    MoveColumn {
        column_id: String,
        index: usize,
    },
    CreateCard {
        column_id: String,
        content: String,
    },
    UpdateCard {
        card_id: String,
        content: String,
        description: String,
        labels: Vec<String>,
        members: Vec<String>,
    },
    DeleteCard {
        card_id: String,
    },
    MoveCard {
        card_id: String,
        from_column_id: String,
        to_column_id: String,
        index: usize,
    },
    AddLabel {
        name: String,
        color: LabelColor,
    },
    RemoveLabel {
        label_id: String,
    },
    AddMember {
        name: String,
    },
    RemoveMember {
        member_id: String,
    },
    RenameBoard {
        title: String,
    },
    ResetBoard,
}

/// What a mutation did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// State changed; render and push.
    Changed,
    /// A new entity with this id was added; render and push.
    Created(String),
    /// Input was rejected and the view must be redrawn from unchanged state.
    Reverted,
    /// Nothing to do (e.g. blank input on a create form).
    Ignored,
}

impl MutationOutcome {
    pub fn needs_push(&self) -> bool {
        matches!(self, MutationOutcome::Changed | MutationOutcome::Created(_))
    }

    pub fn needs_render(&self) -> bool {
        !matches!(self, MutationOutcome::Ignored)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoardStateStore {
    board_id: Option<String>,
    columns: Vec<Column>,
    settings: Settings,
    /// Monotonic counter, bumped whenever board content is replaced or mutated.
    revision: u64,
}

impl BoardStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn board_id(&self) -> Option<&str> {
        self.board_id.as_deref()
    }

    pub fn set_board_id(&mut self, board_id: impl Into<String>) {
        self.board_id = Some(board_id.into());
    }

    pub fn clear_board_id(&mut self) {
        self.board_id = None;
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.locate_card(card_id)
            .map(|(col, pos)| &self.columns[col].cards[pos])
    }

    /// Id of the column currently holding the card.
    pub fn column_of(&self, card_id: &str) -> Option<&str> {
        self.locate_card(card_id)
            .map(|(col, _)| self.columns[col].id.as_str())
    }

    pub fn card_count(&self) -> usize {
        self.columns.iter().map(|c| c.cards.len()).sum()
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn column_index(&self, column_id: &str) -> Result<usize, BoardError> {
        self.columns
            .iter()
            .position(|c| c.id == column_id)
            .ok_or_else(|| BoardError::ColumnNotFound(column_id.to_string()))
    }

    fn locate_card(&self, card_id: &str) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(ci, col)| {
            col.cards
                .iter()
                .position(|c| c.id == card_id)
                .map(|pi| (ci, pi))
        })
    }

    fn card_mut(&mut self, card_id: &str) -> Result<&mut Card, BoardError> {
        let (ci, pi) = self
            .locate_card(card_id)
            .ok_or_else(|| BoardError::CardNotFound(card_id.to_string()))?;
        Ok(&mut self.columns[ci].cards[pi])
    }

    // ── Remote snapshots ────────────────────────────────────────────────

    /// Supersede local state wholesale with a remote snapshot.
    pub fn replace_all(&mut self, columns: Vec<Column>, settings: Settings) {
        self.columns = columns;
        self.settings = settings;
        self.touch();
    }

    /// Stamp the echo-suppression token. Metadata only; the revision is unchanged.
    pub fn stamp_mutation(&mut self, token: &str) {
        self.settings.last_mutation_id = token.to_string();
    }

    /// Whether the given snapshot carries the same content as the store,
    /// ignoring the mutation token.
    pub fn content_eq(&self, columns: &[Column], settings: &Settings) -> bool {
        self.columns == columns && self.settings.content_eq(settings)
    }

    // ── Mutations ───────────────────────────────────────────────────────

    pub fn apply(&mut self, mutation: BoardMutation) -> Result<MutationOutcome, BoardError> {
        match mutation {
            BoardMutation::CreateColumn { title } => Ok(self.create_column(&title)),
            BoardMutation::RenameColumn { column_id, title } => {
                self.rename_column(&column_id, &title)
            }
            BoardMutation::DeleteColumn { column_id } => self.delete_column(&column_id),
            BoardMutation::MoveColumn { column_id, index } => self.move_column(&column_id, index),
            BoardMutation::CreateCard { column_id, content } => {
                self.create_card(&column_id, &content)
            }
            BoardMutation::UpdateCard {
                card_id,
                content,
                description,
                labels,
                members,
            } => self.update_card(&card_id, &content, &description, labels, members),
            BoardMutation::DeleteCard { card_id } => self.delete_card(&card_id),
            BoardMutation::MoveCard {
                card_id,
                from_column_id,
                to_column_id,
                index,
            } => self.move_card(&card_id, &from_column_id, &to_column_id, index),
            BoardMutation::AddLabel { name, color } => Ok(self.add_label(&name, color)),
            BoardMutation::RemoveLabel { label_id } => self.remove_label(&label_id),
            BoardMutation::AddMember { name } => Ok(self.add_member(&name)),
            BoardMutation::RemoveMember { member_id } => self.remove_member(&member_id),
            BoardMutation::RenameBoard { title } => Ok(self.rename_board(&title)),
            BoardMutation::ResetBoard => Ok(self.reset_to_template()),
        }
    }

    pub fn create_column(&mut self, title: &str) -> MutationOutcome {
        let title = title.trim();
        if title.is_empty() {
            return MutationOutcome::Ignored;
        }
        let id = ids::column_id();
        self.columns.push(Column {
            id: id.clone(),
            title: title.to_string(),
            cards: Vec::new(),
        });
        self.touch();
        MutationOutcome::Created(id)
    }

    /// Blank titles revert: the caller redraws the old title and nothing is pushed.
    pub fn rename_column(
        &mut self,
        column_id: &str,
        title: &str,
    ) -> Result<MutationOutcome, BoardError> {
        let idx = self.column_index(column_id)?;
        let title = title.trim();
        if title.is_empty() {
            return Ok(MutationOutcome::Reverted);
        }
        self.columns[idx].title = title.to_string();
        self.touch();
        Ok(MutationOutcome::Changed)
    }

    /// Removes the column together with its cards.
    pub fn delete_column(&mut self, column_id: &str) -> Result<MutationOutcome, BoardError> {
        let idx = self.column_index(column_id)?;
        self.columns.remove(idx);
        self.touch();
        Ok(MutationOutcome::Changed)
    }

    pub fn create_card(
        &mut self,
        column_id: &str,
        content: &str,
    ) -> Result<MutationOutcome, BoardError> {
        let idx = self.column_index(column_id)?;
        let content = content.trim();
        if content.is_empty() {
            return Ok(MutationOutcome::Ignored);
        }
        let id = ids::card_id();
        self.columns[idx].cards.push(Card {
            id: id.clone(),
            content: content.to_string(),
            description: String::new(),
            labels: Vec::new(),
            members: Vec::new(),
        });
        self.touch();
        Ok(MutationOutcome::Created(id))
    }

    /// Label and member sets are replaced, not merged.
    pub fn update_card(
        &mut self,
        card_id: &str,
        content: &str,
        description: &str,
        labels: Vec<String>,
        members: Vec<String>,
    ) -> Result<MutationOutcome, BoardError> {
        let card = self.card_mut(card_id)?;
        let content = content.trim();
        card.content = if content.is_empty() {
            UNTITLED_CARD.to_string()
        } else {
            content.to_string()
        };
        card.description = description.trim().to_string();
        card.labels = dedup(labels);
        card.members = dedup(members);
        self.touch();
        Ok(MutationOutcome::Changed)
    }

    pub fn delete_card(&mut self, card_id: &str) -> Result<MutationOutcome, BoardError> {
        let (ci, pi) = self
            .locate_card(card_id)
            .ok_or_else(|| BoardError::CardNotFound(card_id.to_string()))?;
        self.columns[ci].cards.remove(pi);
        self.touch();
        Ok(MutationOutcome::Changed)
    }

    pub fn add_label(&mut self, name: &str, color: LabelColor) -> MutationOutcome {
        let name = name.trim();
        if name.is_empty() {
            return MutationOutcome::Ignored;
        }
        let id = ids::label_id();
        self.settings.labels.push(Label {
            id: id.clone(),
            name: name.to_string(),
            color_name: color.name().to_string(),
        });
        self.touch();
        MutationOutcome::Created(id)
    }

    /// Removes the label and strips its id from every card.
    pub fn remove_label(&mut self, label_id: &str) -> Result<MutationOutcome, BoardError> {
        let before = self.settings.labels.len();
        self.settings.labels.retain(|l| l.id != label_id);
        if self.settings.labels.len() == before {
            return Err(BoardError::LabelNotFound(label_id.to_string()));
        }
        for card in self.columns.iter_mut().flat_map(|c| c.cards.iter_mut()) {
            card.labels.retain(|id| id != label_id);
        }
        self.touch();
        Ok(MutationOutcome::Changed)
    }

    /// Color is picked at random from the avatar palette.
    pub fn add_member(&mut self, name: &str) -> MutationOutcome {
        let name = name.trim();
        if name.is_empty() {
            return MutationOutcome::Ignored;
        }
        let id = ids::member_id();
        self.settings.members.push(Member {
            id: id.clone(),
            name: name.to_string(),
            initials: initials(name),
            color_name: AvatarColor::random().name().to_string(),
        });
        self.touch();
        MutationOutcome::Created(id)
    }

    /// Removes the member and unassigns them from every card.
    pub fn remove_member(&mut self, member_id: &str) -> Result<MutationOutcome, BoardError> {
        let before = self.settings.members.len();
        self.settings.members.retain(|m| m.id != member_id);
        if self.settings.members.len() == before {
            return Err(BoardError::MemberNotFound(member_id.to_string()));
        }
        for card in self.columns.iter_mut().flat_map(|c| c.cards.iter_mut()) {
            card.members.retain(|id| id != member_id);
        }
        self.touch();
        Ok(MutationOutcome::Changed)
    }

    pub fn rename_board(&mut self, title: &str) -> MutationOutcome {
        let title = title.trim();
        if title.is_empty() {
            return MutationOutcome::Reverted;
        }
        self.settings.board_title = title.to_string();
        self.touch();
        MutationOutcome::Changed
    }

    /// Move a card to `index` in the destination column (remove, then insert).
    /// The index is resolved against the destination after removal and is
    /// clamped to its length.
    pub fn move_card(
        &mut self,
        card_id: &str,
        from_column_id: &str,
        to_column_id: &str,
        index: usize,
    ) -> Result<MutationOutcome, BoardError> {
        let from = self.column_index(from_column_id)?;
        let to = self.column_index(to_column_id)?;
        let pos = self.columns[from]
            .cards
            .iter()
            .position(|c| c.id == card_id)
            .ok_or_else(|| {
                if self.locate_card(card_id).is_some() {
                    BoardError::CardNotInColumn {
                        card_id: card_id.to_string(),
                        column_id: from_column_id.to_string(),
                    }
                } else {
                    BoardError::CardNotFound(card_id.to_string())
                }
            })?;

        let card = self.columns[from].cards.remove(pos);
        let dest = &mut self.columns[to].cards;
        let index = index.min(dest.len());
        dest.insert(index, card);
        self.touch();
        Ok(MutationOutcome::Changed)
    }

    /// Move a column to `index` among the remaining columns, clamped.
    pub fn move_column(
        &mut self,
        column_id: &str,
        index: usize,
    ) -> Result<MutationOutcome, BoardError> {
        let from = self.column_index(column_id)?;
        let column = self.columns.remove(from);
        let index = index.min(self.columns.len());
        self.columns.insert(index, column);
        self.touch();
        Ok(MutationOutcome::Changed)
    }

    /// Wipe content back to the default template. The mutation token is kept
    /// so the next push overwrites it anyway.
    pub fn reset_to_template(&mut self) -> MutationOutcome {
        let token = std::mem::take(&mut self.settings.last_mutation_id);
        self.columns = template::default_columns();
        self.settings = template::default_settings();
        self.settings.last_mutation_id = token;
        self.touch();
        MutationOutcome::Changed
    }
}

fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
