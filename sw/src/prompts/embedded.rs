//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Framing prompt seeded as the first system message
pub const SYSTEM: &str = include_str!("../../prompts/system.pmt");

/// Strict-JSON readiness verdict prompt
pub const READINESS: &str = include_str!("../../prompts/readiness.pmt");

/// Architecture decision record template
pub const DOCUMENT_ADR: &str = include_str!("../../prompts/document-adr.pmt");

/// Product requirements document template
pub const DOCUMENT_PRD: &str = include_str!("../../prompts/document-prd.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "system" => Some(SYSTEM),
        "readiness" => Some(READINESS),
        "document-adr" => Some(DOCUMENT_ADR),
        "document-prd" => Some(DOCUMENT_PRD),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_embedded_known_names() {
        for name in ["system", "readiness", "document-adr", "document-prd"] {
            assert!(get_embedded(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn test_readiness_prompt_demands_json() {
        let prompt = get_embedded("readiness").unwrap();
        assert!(prompt.contains("missingInformation"));
        assert!(prompt.contains("{{transcript}}"));
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("unknown-template").is_none());
    }
}
