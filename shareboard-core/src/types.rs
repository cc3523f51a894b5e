use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Content stored on a card whose title was saved blank.
pub const UNTITLED_CARD: &str = "Untitled";

/// Title shown for boards that never got one.
pub const UNTITLED_BOARD: &str = "Untitled Board";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
    /// Label ids. Ids without a matching label in settings are skipped when rendering.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Member ids, weak in the same way as `labels`.
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub name: String,
    pub color_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub name: String,
    pub initials: String,
    pub color_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub board_title: String,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub members: Vec<Member>,
    /// Echo-suppression token of the last push. Travels with the settings
    /// object through the remote store but is not board content.
    #[serde(default)]
    pub last_mutation_id: String,
}

impl Settings {
    /// Compare everything except `last_mutation_id`.
    pub fn content_eq(&self, other: &Settings) -> bool {
        self.board_title == other.board_title
            && self.labels == other.labels
            && self.members == other.members
    }

    pub fn label(&self, id: &str) -> Option<&Label> {
        self.labels.iter().find(|l| l.id == id)
    }

    pub fn member(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Labels attached to a card, in the card's order. Dangling ids are skipped.
    pub fn resolve_labels<'a>(&'a self, card: &'a Card) -> impl Iterator<Item = &'a Label> + 'a {
        card.labels.iter().filter_map(move |id| self.label(id))
    }

    /// Members assigned to a card, in the card's order. Dangling ids are skipped.
    pub fn resolve_members<'a>(&'a self, card: &'a Card) -> impl Iterator<Item = &'a Member> + 'a {
        card.members.iter().filter_map(move |id| self.member(id))
    }

    /// Title to display, falling back when the board has none.
    pub fn display_title(&self) -> &str {
        let title = self.board_title.trim();
        if title.is_empty() {
            UNTITLED_BOARD
        } else {
            title
        }
    }
}

/// Fixed label palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelColor {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Orange,
    Pink,
    Gray,
}

impl LabelColor {
    pub const ALL: [LabelColor; 8] = [
        LabelColor::Red,
        LabelColor::Blue,
        LabelColor::Green,
        LabelColor::Yellow,
        LabelColor::Purple,
        LabelColor::Orange,
        LabelColor::Pink,
        LabelColor::Gray,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LabelColor::Red => "red",
            LabelColor::Blue => "blue",
            LabelColor::Green => "green",
            LabelColor::Yellow => "yellow",
            LabelColor::Purple => "purple",
            LabelColor::Orange => "orange",
            LabelColor::Pink => "pink",
            LabelColor::Gray => "gray",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Palette entry used for rendering; unknown names render gray.
    pub fn for_render(name: &str) -> Self {
        Self::from_name(name).unwrap_or(LabelColor::Gray)
    }
}

/// Fixed avatar palette for members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarColor {
    Blue,
    Emerald,
    Violet,
    Amber,
    Rose,
    Cyan,
    Slate,
}

impl AvatarColor {
    pub const ALL: [AvatarColor; 7] = [
        AvatarColor::Blue,
        AvatarColor::Emerald,
        AvatarColor::Violet,
        AvatarColor::Amber,
        AvatarColor::Rose,
        AvatarColor::Cyan,
        AvatarColor::Slate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AvatarColor::Blue => "blue",
            AvatarColor::Emerald => "emerald",
            AvatarColor::Violet => "violet",
            AvatarColor::Amber => "amber",
            AvatarColor::Rose => "rose",
            AvatarColor::Cyan => "cyan",
            AvatarColor::Slate => "slate",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Palette entry used for rendering; unknown names render slate.
    pub fn for_render(name: &str) -> Self {
        Self::from_name(name).unwrap_or(AvatarColor::Slate)
    }

    /// Pick a palette entry at random. New members get a random color on purpose.
    pub fn random() -> Self {
        *Self::ALL
            .choose(&mut rand::thread_rng())
            .unwrap_or(&AvatarColor::Slate)
    }
}

/// Initials from a display name: first letter of the first word plus first
/// letter of the last word, uppercased. Single-word names give one letter.
pub fn initials(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let first = words.first().and_then(|w| w.chars().next());
    let last = if words.len() > 1 {
        words.last().and_then(|w| w.chars().next())
    } else {
        None
    };
    first
        .into_iter()
        .chain(last)
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(labels: &[&str], members: &[&str]) -> Card {
        Card {
            id: "card-1".to_string(),
            content: "Task".to_string(),
            description: String::new(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            members: members.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_initials_two_words() {
        assert_eq!(initials("Alex Doe"), "AD");
        assert_eq!(initials("sam smith"), "SS");
    }

    #[test]
    fn test_initials_uses_first_and_last_word() {
        assert_eq!(initials("Mary Jane Watson"), "MW");
    }

    #[test]
    fn test_initials_single_word_and_blank() {
        assert_eq!(initials("cher"), "C");
        assert_eq!(initials("   "), "");
        assert_eq!(initials(""), "");
    }

    #[test]
    fn test_random_avatar_color_is_in_palette() {
        for _ in 0..50 {
            let color = AvatarColor::random();
            assert!(AvatarColor::ALL.contains(&color));
        }
    }

    #[test]
    fn test_unknown_colors_fall_back_for_render() {
        assert_eq!(LabelColor::for_render("purple"), LabelColor::Purple);
        assert_eq!(LabelColor::for_render("chartreuse"), LabelColor::Gray);
        assert_eq!(AvatarColor::for_render("nope"), AvatarColor::Slate);
    }

    #[test]
    fn test_dangling_references_are_skipped() {
        let settings = Settings {
            board_title: String::new(),
            labels: vec![Label {
                id: "l1".to_string(),
                name: "Urgent".to_string(),
                color_name: "red".to_string(),
            }],
            members: vec![],
            last_mutation_id: String::new(),
        };
        let c = card(&["gone", "l1"], &["m-missing"]);
        let labels: Vec<_> = settings.resolve_labels(&c).map(|l| l.name.as_str()).collect();
        assert_eq!(labels, vec!["Urgent"]);
        assert_eq!(settings.resolve_members(&c).count(), 0);
    }

    #[test]
    fn test_content_eq_ignores_mutation_token() {
        let a = Settings {
            board_title: "Roadmap".to_string(),
            last_mutation_id: "aaa".to_string(),
            ..Settings::default()
        };
        let mut b = a.clone();
        b.last_mutation_id = "bbb".to_string();
        assert!(a.content_eq(&b));
        b.board_title = "Other".to_string();
        assert!(!a.content_eq(&b));
    }

    #[test]
    fn test_settings_wire_names() {
        let json = serde_json::json!({
            "boardTitle": "Sprint",
            "labels": [{ "id": "l1", "name": "QA", "colorName": "purple" }],
            "members": [],
            "lastMutationId": "tok"
        });
        let settings: Settings = serde_json::from_value(json).unwrap();
        assert_eq!(settings.board_title, "Sprint");
        assert_eq!(settings.labels[0].color_name, "purple");
        assert_eq!(settings.last_mutation_id, "tok");
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = serde_json::json!({ "id": "c", "content": "x" });
        let c: Card = serde_json::from_value(json).unwrap();
        assert!(c.labels.is_empty());
        assert!(c.description.is_empty());
        let s: Settings = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(s.display_title(), UNTITLED_BOARD);
    }
}
