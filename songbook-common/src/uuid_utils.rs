//! UUID utilities

use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new UUIDv4 as a hyphenated string id
pub fn generate_id() -> String {
    generate().to_string()
}

/// Generate a new UUIDv4 in compact (hyphen-free) form
pub fn generate_compact() -> String {
    generate().simple().to_string()
}

/// Parse UUID from string
pub fn parse(s: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique_and_parseable() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert!(parse(&a).is_ok());
    }

    #[test]
    fn test_compact_form_has_no_hyphens() {
        let id = generate_compact();
        assert_eq!(id.len(), 32);
        assert!(!id.contains('-'));
    }
}
