//! Context assembly
//!
//! Joins retrieved passages into the single context block injected into
//! the grounded-generation prompt. Pure: no I/O, no state.

use crate::retriever::RetrievedPassage;

/// Delimiter between passages in the assembled context
pub const PASSAGE_DELIMITER: &str = "\n\n---\n\n";

/// Join passage texts in the given (relevance) order.
///
/// An empty passage list yields an empty string; the generation system
/// instruction handles the no-context case, not this function.
pub fn assemble(passages: &[RetrievedPassage]) -> String {
    passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(PASSAGE_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(text: &str, score: f32) -> RetrievedPassage {
        RetrievedPassage {
            text: text.to_string(),
            score,
        }
    }

    #[test]
    fn test_assemble_joins_in_order_with_delimiter() {
        let passages = vec![passage("first passage", 0.9), passage("second passage", 0.5)];
        let context = assemble(&passages);
        assert_eq!(context, "first passage\n\n---\n\nsecond passage");
    }

    #[test]
    fn test_assemble_empty_input_yields_empty_string() {
        assert_eq!(assemble(&[]), "");
    }

    #[test]
    fn test_assemble_single_passage_has_no_delimiter() {
        let passages = vec![passage("only", 1.0)];
        assert_eq!(assemble(&passages), "only");
    }

    #[test]
    fn test_assemble_is_pure() {
        let passages = vec![passage("a", 0.2), passage("b", 0.1)];
        assert_eq!(assemble(&passages), assemble(&passages));
    }
}
