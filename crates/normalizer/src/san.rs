//! SAN move normalization.
//!
//! Converts raw movetext into canonical move tokens that are comparable
//! across providers: move numbers and result markers are dropped, digit-form
//! castling is folded to letter form, annotation glyphs and check/mate
//! suffixes are stripped, and every token must parse as standard algebraic
//! notation.

use crate::error::{Error, Result};
use shakmaty::san::SanPlus;

/// Normalize a whitespace-separated movetext string into canonical tokens.
///
/// Accepts both bare provider movetext ("e4 c5 Nf3") and numbered book
/// movetext ("1. e4 c5 2. Nf3"). Pure function; the first token that fails
/// SAN parsing yields `Error::ParseMove` with its 1-based ply.
pub fn normalize_movetext(movetext: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();

    for raw in movetext.split_whitespace() {
        if is_move_number(raw) || is_result_marker(raw) {
            continue;
        }

        let cleaned = clean_token(raw);
        if cleaned.is_empty() {
            continue;
        }

        let ply = tokens.len() + 1;
        let san: SanPlus = cleaned.parse().map_err(|_| Error::ParseMove {
            token: raw.to_string(),
            ply,
        })?;

        // Canonical rendering: SAN without check/mate suffix.
        tokens.push(san.san.to_string());
    }

    Ok(tokens)
}

/// Move-number tokens: "1.", "1...", "23." and bare "12".
fn is_move_number(token: &str) -> bool {
    let trimmed = token.trim_end_matches('.');
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) && trimmed.len() < token.len()
        || (!token.is_empty() && token.chars().all(|c| c.is_ascii_digit()))
}

/// Game-result tokens appended to movetext.
fn is_result_marker(token: &str) -> bool {
    matches!(token, "1-0" | "0-1" | "1/2-1/2" | "*")
}

/// Strip annotation glyphs and fold digit-form castling to letter form.
fn clean_token(token: &str) -> String {
    let stripped = token.trim_end_matches(['!', '?']);
    match stripped {
        "0-0" => "O-O".to_string(),
        "0-0+" => "O-O+".to_string(),
        "0-0#" => "O-O#".to_string(),
        "0-0-0" => "O-O-O".to_string(),
        "0-0-0+" => "O-O-O+".to_string(),
        "0-0-0#" => "O-O-O#".to_string(),
        other => other.to_string(),
    }
}
