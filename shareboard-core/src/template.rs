/// Seed content for boards that do not exist yet.
use crate::types::*;

/// Columns of a freshly created board.
pub fn default_columns() -> Vec<Column> {
    vec![
        Column {
            id: "col-1".to_string(),
            title: "To Do".to_string(),
            cards: vec![Card {
                id: "card-1".to_string(),
                content: "Welcome! 👋".to_string(),
                description: "This board is now live and collaborative.".to_string(),
                labels: vec!["l1".to_string()],
                members: vec!["m1".to_string()],
            }],
        },
        Column {
            id: "col-2".to_string(),
            title: "Done".to_string(),
            cards: Vec::new(),
        },
    ]
}

/// Settings of a freshly created board.
pub fn default_settings() -> Settings {
    let label = |id: &str, color: LabelColor, name: &str| Label {
        id: id.to_string(),
        name: name.to_string(),
        color_name: color.name().to_string(),
    };
    let member = |id: &str, name: &str, color: AvatarColor| Member {
        id: id.to_string(),
        name: name.to_string(),
        initials: initials(name),
        color_name: color.name().to_string(),
    };
    Settings {
        board_title: UNTITLED_BOARD.to_string(),
        labels: vec![
            label("l1", LabelColor::Red, "Urgent"),
            label("l2", LabelColor::Blue, "Dev"),
            label("l3", LabelColor::Green, "Design"),
        ],
        members: vec![
            member("m1", "Alex Doe", AvatarColor::Blue),
            member("m2", "Sam Smith", AvatarColor::Emerald),
        ],
        last_mutation_id: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_template_shape() {
        let columns = default_columns();
        assert_eq!(columns.len(), 2);
        let cards: usize = columns.iter().map(|c| c.cards.len()).sum();
        assert_eq!(cards, 1);
    }

    #[test]
    fn test_template_references_resolve() {
        let columns = default_columns();
        let settings = default_settings();
        let card = &columns[0].cards[0];
        assert_eq!(settings.resolve_labels(card).count(), card.labels.len());
        assert_eq!(settings.resolve_members(card).count(), card.members.len());
        assert_eq!(settings.members[0].initials, "AD");
    }

    #[test]
    fn test_template_ids_unique() {
        let settings = default_settings();
        let labels: HashSet<_> = settings.labels.iter().map(|l| &l.id).collect();
        assert_eq!(labels.len(), settings.labels.len());
        let members: HashSet<_> = settings.members.iter().map(|m| &m.id).collect();
        assert_eq!(members.len(), settings.members.len());
    }
}
