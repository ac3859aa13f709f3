//! Opening book loader.
//!
//! Parses the tab-separated reference book format into ordered
//! `OpeningDefinition`s with canonical move tokens:
//!
//! ```text
//! eco<TAB>name<TAB>movetext[<TAB>alias;alias...]
//! ```
//!
//! Blank lines and `#` comments are skipped. The file format is a boundary
//! concern; the reference tree itself only ever sees canonical tokens.

use crate::error::{Error, Result};
use crate::san::normalize_movetext;
use crate::schema::OpeningDefinition;

/// Parse a whole book file into ordered definitions.
///
/// Definition order matters downstream: the first label loaded for a move
/// sequence is canonical.
pub fn parse_book(contents: &str) -> Result<Vec<OpeningDefinition>> {
    let mut definitions = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split('\t');
        let code = fields.next().unwrap_or("").trim();
        let name = fields.next().unwrap_or("").trim();
        let movetext = fields.next().unwrap_or("").trim();
        let aliases = fields
            .next()
            .map(|raw| {
                raw.split(';')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if code.is_empty() || name.is_empty() || movetext.is_empty() {
            return Err(Error::Definition {
                line: line_no,
                reason: "expected eco<TAB>name<TAB>movetext".to_string(),
            });
        }

        let tokens = normalize_movetext(movetext).map_err(|e| Error::Definition {
            line: line_no,
            reason: e.to_string(),
        })?;
        if tokens.is_empty() {
            return Err(Error::Definition {
                line: line_no,
                reason: "movetext contains no moves".to_string(),
            });
        }

        definitions.push(OpeningDefinition {
            code: code.to_string(),
            name: name.to_string(),
            aliases,
            tokens,
        });
    }

    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_book() {
        let book = "B00\tKing's Pawn Game\t1. e4\nB20\tSicilian Defense\t1. e4 c5\n";
        let defs = parse_book(book).unwrap();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].code, "B00");
        assert_eq!(defs[0].tokens, vec!["e4"]);
        assert_eq!(defs[1].tokens, vec!["e4", "c5"]);
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let book = "# reference book\n\nC20\tKing's Pawn Game: Wayward Queen Attack\t1. e4 e5 2. Qh5\n";
        let defs = parse_book(book).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].tokens, vec!["e4", "e5", "Qh5"]);
    }

    #[test]
    fn test_aliases_column() {
        let book = "B20\tSicilian Defense\t1. e4 c5\tSicilian;Sicilian Game\n";
        let defs = parse_book(book).unwrap();
        assert_eq!(defs[0].aliases, vec!["Sicilian", "Sicilian Game"]);
    }

    #[test]
    fn test_missing_field_rejected() {
        let err = parse_book("B20\tSicilian Defense\n").unwrap_err();
        assert!(matches!(err, Error::Definition { line: 1, .. }));
    }

    #[test]
    fn test_bad_movetext_rejected() {
        let err = parse_book("B20\tSicilian Defense\t1. e4 zz9\n").unwrap_err();
        assert!(matches!(err, Error::Definition { line: 1, .. }));
    }
}
