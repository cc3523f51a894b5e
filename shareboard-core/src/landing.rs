/// Landing surface state: board addressing and the join-code form.
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::ids;

/// Characters escaped when a board id is put into a query string.
const ID_QUERY: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Board id carried by a page URL, from `?id=` or the fragment
/// (`#id=...` or a bare `#code`). Percent-decoded and trimmed.
pub fn board_id_from_url(url: &str) -> Option<String> {
    let (rest, fragment) = match url.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (url, None),
    };
    let query = rest.split_once('?').map(|(_, q)| q);

    query
        .and_then(id_param)
        .or_else(|| {
            fragment.and_then(|f| {
                if f.contains('=') {
                    id_param(f)
                } else {
                    decode_id(f)
                }
            })
        })
}

fn id_param(pairs: &str) -> Option<String> {
    pairs
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "id")
        .and_then(|(_, value)| decode_id(value))
}

fn decode_id(raw: &str) -> Option<String> {
    let decoded = percent_decode_str(&raw.replace('+', " "))
        .decode_utf8_lossy()
        .trim()
        .to_string();
    if decoded.is_empty() {
        None
    } else {
        Some(decoded)
    }
}

/// Share link for a board: `base` without its query/fragment plus `?id=`.
pub fn share_url(base: &str, board_id: &str) -> String {
    let end = base.find(|c: char| c == '?' || c == '#').unwrap_or(base.len());
    format!(
        "{}?id={}",
        &base[..end],
        utf8_percent_encode(board_id, ID_QUERY)
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    /// Characters taken, code still incomplete.
    Accepted,
    /// Input refused; the slots are untouched.
    Refused,
    /// Every slot is filled.
    Complete(String),
}

/// Fixed-length code entry: one character per slot with a focus cursor.
#[derive(Debug, Clone)]
pub struct JoinCodeInput {
    slots: Vec<Option<char>>,
    focus: usize,
}

impl JoinCodeInput {
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len.max(1)],
            focus: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn set_focus(&mut self, slot: usize) {
        self.focus = slot.min(self.slots.len() - 1);
    }

    pub fn slots(&self) -> &[Option<char>] {
        &self.slots
    }

    /// Complete code, if every slot holds a character.
    pub fn code(&self) -> Option<String> {
        self.slots.iter().copied().collect()
    }

    /// Type one character into the focused slot and advance.
    pub fn type_char(&mut self, c: char) -> InputOutcome {
        let c = c.to_ascii_lowercase();
        if !ids::is_code_char(c) {
            return InputOutcome::Refused;
        }
        self.slots[self.focus] = Some(c);
        if self.focus + 1 < self.slots.len() {
            self.focus += 1;
        }
        self.outcome()
    }

    /// Clear the focused slot, or step back and clear the previous one if
    /// the focused slot is already empty.
    pub fn backspace(&mut self) {
        if self.slots[self.focus].is_some() {
            self.slots[self.focus] = None;
        } else if self.focus > 0 {
            self.focus -= 1;
            self.slots[self.focus] = None;
        }
    }

    /// Distribute pasted text over the slots starting at the focused one.
    /// A pasted share link contributes its board id. Whitespace is ignored;
    /// any other invalid character refuses the whole paste.
    pub fn paste(&mut self, text: &str) -> InputOutcome {
        let source = board_id_from_url(text).unwrap_or_else(|| text.to_string());
        let chars: Vec<char> = source
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if chars.is_empty() || !chars.iter().all(|c| ids::is_code_char(*c)) {
            return InputOutcome::Refused;
        }

        let mut slot = self.focus;
        for c in chars {
            if slot >= self.slots.len() {
                break;
            }
            self.slots[slot] = Some(c);
            slot += 1;
        }
        self.focus = slot.min(self.slots.len() - 1);
        self.outcome()
    }

    /// The code was not accepted: empty every slot and refocus the first.
    pub fn reject(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.focus = 0;
    }

    fn outcome(&self) -> InputOutcome {
        match self.code() {
            Some(code) => InputOutcome::Complete(code),
            None => InputOutcome::Accepted,
        }
    }
}
