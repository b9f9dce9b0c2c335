//! Extraction prompt.
//!
//! The schema block uses the same field and member names the validator
//! checks, so a compliant answer needs no alias lookup.

use crate::document::PdfDocument;
use crate::providers::ChatMessage;

/// System prompt sent with every document.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract structured study information from biomedical research articles.

Rules:
- Use only the attached PDF.
- Do not guess, estimate, or infer values.
- If a value is not stated explicitly, set it to null.
- Return exactly one JSON object and nothing else.

JSON schema:
{
  "title": string | null,
  "study_design": string | null,
  "population": string | null,
  "sample_size": integer | null,
  "outcome": string | null,
  "effect_size": {
    "type": string | null,
    "point": number | null,
    "ci_lower": number | null,
    "ci_upper": number | null
  }
}"#;

/// User instruction that accompanies the PDF.
pub const USER_INSTRUCTION: &str = "Extract the required study information.";

/// Messages for one extraction request.
pub fn extraction_messages(document: &PdfDocument) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
        ChatMessage::user_with_document(USER_INSTRUCTION, document.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use trialscan_core::rules::REQUIRED_FIELDS;

    #[test]
    fn test_prompt_names_every_required_field() {
        for field in REQUIRED_FIELDS {
            assert!(
                EXTRACTION_SYSTEM_PROMPT.contains(&format!("\"{}\"", field)),
                "prompt misses {}",
                field
            );
        }
    }

    #[test]
    fn test_messages_carry_document() {
        let doc = PdfDocument::from_bytes("a.pdf", b"%PDF-".to_vec());
        let messages = extraction_messages(&doc);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].text(), USER_INSTRUCTION);
        assert_eq!(messages[1].documents().next().unwrap().filename(), "a.pdf");
    }
}
