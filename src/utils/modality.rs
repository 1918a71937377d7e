//! Participant modality tagging
//!
//! A modality is a backwards-compatible extension of the attendee id and
//! join token schemas: `<base>#<modality>`. Content share joins the same
//! meeting as the attendee, tagged with the `content` modality.

/// Separator between the base id and the modality tag
pub const MODALITY_SEPARATOR: char = '#';

/// Modality tag used by content share attendees
pub const MODALITY_CONTENT: &str = "content";

/// Accessors for a modality-tagged identifier
pub trait Modality {
    /// The raw id, unchanged
    fn id(&self) -> &str;

    /// Everything before the first separator
    fn base(&self) -> &str;

    /// The tag after the separator, only when the id splits into exactly two parts
    fn modality(&self) -> &str;

    /// Whether the id carries the given (non-empty) modality
    fn has_modality(&self, modality: &str) -> bool {
        !modality.is_empty() && self.modality() == modality
    }
}

/// Modality view over an owned id string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DefaultModality {
    id: String,
}

impl DefaultModality {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Append `#<modality>` to a base id
    pub fn tagged(base: &str, modality: &str) -> String {
        format!("{}{}{}", base, MODALITY_SEPARATOR, modality)
    }
}

impl Modality for DefaultModality {
    fn id(&self) -> &str {
        &self.id
    }

    fn base(&self) -> &str {
        self.id
            .split(MODALITY_SEPARATOR)
            .next()
            .unwrap_or_default()
    }

    fn modality(&self) -> &str {
        // `a#b#c` is deliberately not treated as tagged
        let mut parts = self.id.split(MODALITY_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(tag), None) => tag,
            _ => "",
        }
    }
}

impl From<&str> for DefaultModality {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_id() {
        let m = DefaultModality::new("");
        assert_eq!(m.base(), "");
        assert_eq!(m.modality(), "");
        assert!(!m.has_modality(""));
        assert!(!m.has_modality(MODALITY_CONTENT));
    }

    #[test]
    fn test_id_without_separator() {
        for id in ["attendee-1", "dGhpcyBpcyBhIHRva2Vu", "x"] {
            let m = DefaultModality::new(id);
            assert_eq!(m.id(), id);
            assert_eq!(m.base(), id);
            assert_eq!(m.modality(), "");
        }
    }

    #[test]
    fn test_tagged_id() {
        let m = DefaultModality::new("attendee-1#content");
        assert_eq!(m.base(), "attendee-1");
        assert_eq!(m.modality(), "content");
        assert!(m.has_modality("content"));
        assert!(!m.has_modality("video"));
        assert!(!m.has_modality(""));
    }

    #[test]
    fn test_multiple_separators_have_no_modality() {
        let m = DefaultModality::new("a#b#c");
        assert_eq!(m.base(), "a");
        assert_eq!(m.modality(), "");
        assert!(!m.has_modality("b"));
        assert!(!m.has_modality("c"));
    }

    #[test]
    fn test_separator_edges() {
        let trailing = DefaultModality::new("attendee#");
        assert_eq!(trailing.base(), "attendee");
        assert_eq!(trailing.modality(), "");

        let leading = DefaultModality::new("#content");
        assert_eq!(leading.base(), "");
        assert!(leading.has_modality(MODALITY_CONTENT));
    }

    #[test]
    fn test_tagged_builder() {
        let id = DefaultModality::tagged("token", MODALITY_CONTENT);
        assert_eq!(id, "token#content");
        assert!(DefaultModality::new(id).has_modality(MODALITY_CONTENT));
    }
}
