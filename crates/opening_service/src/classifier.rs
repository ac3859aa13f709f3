//! Incremental opening classification.
//!
//! Each game carries a `Classification` whose private cursor remembers the
//! tree node and ply reached by the previous walk, so classifying an update
//! costs time proportional to the new moves only, never to total game
//! length. Divergence handling (a move list that no longer extends the
//! stored prefix) is the registry's call: it drops the cursor and re-runs
//! the walk from the root.

use crate::game::MoveRec;
use crate::tree::{NodeId, OpeningTree, ROOT};
use serde::Serialize;
use std::sync::Arc;

/// The opening a game has been matched to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpeningMatch {
    pub code: String,
    pub name: String,
}

/// Private walk state: the node the last walk stopped at and how many
/// plies it consumed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Cursor {
    pub(crate) node: NodeId,
    pub(crate) walked: usize,
}

/// Result of classifying a game's move history.
///
/// `matched_ply` is always <= the number of moves walked; once
/// `left_book` is set the match is frozen and later moves change nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub opening: Option<OpeningMatch>,
    pub matched_ply: usize,
    pub left_book: bool,
    cursor: Cursor,
}

impl Classification {
    /// The unclassified sentinel: no label, zero matched plies, cursor at
    /// the root.
    pub fn unclassified() -> Self {
        Self {
            opening: None,
            matched_ply: 0,
            left_book: false,
            cursor: Cursor { node: ROOT, walked: 0 },
        }
    }

    /// ECO code of the matched opening, if any.
    pub fn code(&self) -> Option<&str> {
        self.opening.as_ref().map(|o| o.code.as_str())
    }
}

/// Matches evolving move histories against the reference tree.
#[derive(Debug, Clone)]
pub struct Classifier {
    tree: Arc<OpeningTree>,
}

impl Classifier {
    pub fn new(tree: Arc<OpeningTree>) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &Arc<OpeningTree> {
        &self.tree
    }

    /// Classify `moves`, resuming from `prev` when given.
    ///
    /// The caller guarantees that `moves` extends the history `prev` was
    /// computed from; passing `None` rewalks from the root. Pure function
    /// of (moves, prev, tree): resuming after N plies and classifying the
    /// full list from scratch produce identical results.
    pub fn classify(&self, moves: &[MoveRec], prev: Option<&Classification>) -> Classification {
        let mut current = match prev {
            // A stale cursor beyond the move list means the caller's
            // prefix contract was broken; start over rather than walk
            // from an unreachable node.
            Some(p) if p.cursor.walked <= moves.len() => p.clone(),
            Some(_) => Classification::unclassified(),
            None => Classification::unclassified(),
        };

        if current.left_book {
            return current;
        }

        for rec in &moves[current.cursor.walked..] {
            match self.tree.child(current.cursor.node, &rec.san) {
                Some(child) => {
                    current.cursor.node = child;
                    current.cursor.walked += 1;
                    if let Some(label) = self.tree.label(child) {
                        current.opening = Some(OpeningMatch {
                            code: label.code.clone(),
                            name: label.name.clone(),
                        });
                        current.matched_ply = current.cursor.walked;
                    }
                }
                None => {
                    current.left_book = true;
                    break;
                }
            }
        }

        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::MoveRec;
    use crate::tree::OpeningTree;
    use normalizer::OpeningDefinition;

    fn def(code: &str, name: &str, tokens: &[&str]) -> OpeningDefinition {
        OpeningDefinition {
            code: code.to_string(),
            name: name.to_string(),
            aliases: vec![],
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn classifier() -> Classifier {
        let tree = OpeningTree::build(vec![
            def("B00", "King's Pawn Game", &["e4"]),
            def("C20", "King's Pawn Game: Open Game", &["e4", "e5"]),
            def("B20", "Sicilian Defense", &["e4", "c5"]),
        ])
        .unwrap();
        Classifier::new(Arc::new(tree))
    }

    fn moves(tokens: &[&str]) -> Vec<MoveRec> {
        MoveRec::sequence(tokens.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn test_scenario_sicilian_then_out_of_book() {
        let classifier = classifier();

        let cls = classifier.classify(&moves(&["e4", "c5"]), None);
        assert_eq!(cls.code(), Some("B20"));
        assert_eq!(cls.matched_ply, 2);
        assert!(!cls.left_book);

        // Appending Nf3 leaves the classification frozen at B20
        let cls = classifier.classify(&moves(&["e4", "c5", "Nf3"]), Some(&cls));
        assert_eq!(cls.code(), Some("B20"));
        assert_eq!(cls.matched_ply, 2);
        assert!(cls.left_book);

        // Further moves change nothing
        let frozen = classifier.classify(&moves(&["e4", "c5", "Nf3", "d6"]), Some(&cls));
        assert_eq!(frozen.code(), Some("B20"));
        assert_eq!(frozen.matched_ply, 2);
        assert!(frozen.left_book);
    }

    #[test]
    fn test_matched_ply_bounded_by_moves() {
        let classifier = classifier();
        for history in [&["e4"][..], &["e4", "e5"], &["e4", "c5", "Nf3", "d6"], &["d4"]] {
            let cls = classifier.classify(&moves(history), None);
            assert!(cls.matched_ply <= history.len());
        }
    }

    #[test]
    fn test_idempotent_without_new_moves() {
        let classifier = classifier();
        let history = moves(&["e4", "e5"]);

        let first = classifier.classify(&history, None);
        let second = classifier.classify(&history, Some(&first));
        assert_eq!(first, second);
    }

    #[test]
    fn test_incremental_equals_from_scratch() {
        let classifier = classifier();
        let full = moves(&["e4", "c5", "Nf3", "d6"]);

        let after_two = classifier.classify(&full[..2], None);
        let incremental = classifier.classify(&full, Some(&after_two));
        let scratch = classifier.classify(&full, None);
        assert_eq!(incremental, scratch);
    }

    #[test]
    fn test_unclassified_sentinel() {
        let classifier = classifier();
        let cls = classifier.classify(&moves(&["d4", "d5"]), None);
        assert_eq!(cls.opening, None);
        assert_eq!(cls.matched_ply, 0);
        // First move already off-tree
        assert!(cls.left_book);
    }

    #[test]
    fn test_empty_history() {
        let classifier = classifier();
        let cls = classifier.classify(&[], None);
        assert_eq!(cls, Classification::unclassified());
    }

    #[test]
    fn test_stale_cursor_falls_back_to_root() {
        let classifier = classifier();
        let long = classifier.classify(&moves(&["e4", "e5"]), None);

        // Shrunken history: cursor is past the end, must rewalk
        let cls = classifier.classify(&moves(&["e4"]), Some(&long));
        assert_eq!(cls.code(), Some("B00"));
        assert_eq!(cls.matched_ply, 1);
    }

    #[test]
    fn test_label_upgrade_along_the_walk() {
        let classifier = classifier();

        let after_one = classifier.classify(&moves(&["e4"]), None);
        assert_eq!(after_one.code(), Some("B00"));

        let after_two = classifier.classify(&moves(&["e4", "e5"]), Some(&after_one));
        assert_eq!(after_two.code(), Some("C20"));
        assert_eq!(after_two.matched_ply, 2);
    }
}
