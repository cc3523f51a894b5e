/// Identifier generation for boards, board entities and push tokens.
///
/// Entity ids are short random base36 strings with a kind prefix
/// (`col-`, `card-`, `l-`, `m-`). Board codes are unprefixed so they can be
/// typed into the join form. Mutation tokens are UUIDv4 in simple form.
use rand::Rng;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the random part of entity ids.
pub const ENTITY_ID_LEN: usize = 9;

/// Length of generated board codes (also the join form's slot count).
pub const BOARD_CODE_LEN: usize = 6;

fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

fn entity_id(prefix: &str) -> String {
    format!("{}{}", prefix, random_base36(ENTITY_ID_LEN))
}

pub fn column_id() -> String {
    entity_id("col-")
}

pub fn card_id() -> String {
    entity_id("card-")
}

pub fn label_id() -> String {
    entity_id("l-")
}

pub fn member_id() -> String {
    entity_id("m-")
}

/// New shareable board code of the given length.
pub fn board_code(len: usize) -> String {
    random_base36(len)
}

/// Opaque token stamped on a push so the session can recognise its own echo.
pub fn mutation_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Whether a character may appear in a board code.
pub fn is_code_char(c: char) -> bool {
    c.is_ascii_digit() || c.is_ascii_lowercase()
}
