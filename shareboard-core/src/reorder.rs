/// Drop-position calculation for drag-and-drop of cards and columns.
///
/// The destination index is the number of siblings whose midpoint is at or
/// before the pointer, i.e. the item is inserted before the first sibling
/// whose midpoint lies past the pointer (or at the end). The dragged element
/// itself never counts as a sibling, so the index refers to the destination
/// list after the item has been removed from its source. Nothing here touches
/// state: the result is a [`BoardMutation`] the caller applies and pushes.
use crate::store::{BoardError, BoardMutation, BoardStateStore};

/// Layout box of one rendered sibling along the drag axis.
///
/// For cards `start`/`extent` are top/height; for columns they are
/// left/width.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemBounds {
    pub id: String,
    pub start: f64,
    pub extent: f64,
}

impl ItemBounds {
    pub fn new(id: impl Into<String>, start: f64, extent: f64) -> Self {
        Self {
            id: id.into(),
            start,
            extent,
        }
    }

    pub fn midpoint(&self) -> f64 {
        self.start + self.extent / 2.0
    }
}

/// Insertion index for `dragged_id` given the siblings' layout and the
/// pointer coordinate on the same axis.
pub fn drop_index(dragged_id: &str, siblings: &[ItemBounds], pointer: f64) -> usize {
    siblings
        .iter()
        .filter(|s| s.id != dragged_id)
        .filter(|s| s.midpoint() <= pointer)
        .count()
}

/// Resolve a card drop into a move. `siblings` are the rendered cards of the
/// destination column (the dragged card may be among them), `pointer_y` the
/// pointer's vertical position in the same coordinate space.
pub fn plan_card_drop(
    store: &BoardStateStore,
    card_id: &str,
    from_column_id: &str,
    to_column_id: &str,
    siblings: &[ItemBounds],
    pointer_y: f64,
) -> Result<BoardMutation, BoardError> {
    let dest = store
        .column(to_column_id)
        .ok_or_else(|| BoardError::ColumnNotFound(to_column_id.to_string()))?;
    let remaining = dest.cards.iter().filter(|c| c.id != card_id).count();
    let index = drop_index(card_id, siblings, pointer_y).min(remaining);

    Ok(BoardMutation::MoveCard {
        card_id: card_id.to_string(),
        from_column_id: from_column_id.to_string(),
        to_column_id: to_column_id.to_string(),
        index,
    })
}

/// Resolve a column drop into a move. `siblings` are the rendered columns
/// in board order, `pointer_x` the pointer's horizontal position.
pub fn plan_column_drop(
    store: &BoardStateStore,
    column_id: &str,
    siblings: &[ItemBounds],
    pointer_x: f64,
) -> Result<BoardMutation, BoardError> {
    if store.column(column_id).is_none() {
        return Err(BoardError::ColumnNotFound(column_id.to_string()));
    }
    let remaining = store.columns().len() - 1;
    let index = drop_index(column_id, siblings, pointer_x).min(remaining);

    Ok(BoardMutation::MoveColumn {
        column_id: column_id.to_string(),
        index,
    })
}
