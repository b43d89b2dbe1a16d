//! XML name validation
//!
//! Lexical checks for NCNames and QNames as they appear in schema
//! `name`, `type`, `ref` and `base` attributes.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

// Simplified NCName production: the BMP letter ranges of XML 1.0 5th edition.
static NCNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}\u{37F}-\u{1FFF}\u{200C}-\u{200D}\u{2070}-\u{218F}\u{2C00}-\u{2FEF}\u{3001}-\u{D7FF}\u{F900}-\u{FDCF}\u{FDF0}-\u{FFFD}][A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}\u{37F}-\u{1FFF}\u{200C}-\u{200D}\u{2070}-\u{218F}\u{2C00}-\u{2FEF}\u{3001}-\u{D7FF}\u{F900}-\u{FDCF}\u{FDF0}-\u{FFFD}\-\.0-9\u{B7}\u{300}-\u{36F}\u{203F}-\u{2040}]*$",
    )
    .expect("NCName pattern is valid")
});

/// Check if a string is a valid NCName (non-colonized name)
pub fn is_valid_ncname(name: &str) -> bool {
    NCNAME.is_match(name)
}

/// Check if a string is a valid QName (`prefix:local` or `local`)
pub fn is_valid_qname(name: &str) -> bool {
    match name.split_once(':') {
        Some((prefix, local)) => is_valid_ncname(prefix) && is_valid_ncname(local),
        None => is_valid_ncname(name),
    }
}

/// Validate an NCName and return an error if invalid
pub fn validate_ncname(name: &str) -> Result<()> {
    if is_valid_ncname(name) {
        Ok(())
    } else {
        Err(Error::Name(format!("Invalid NCName: '{}'", name)))
    }
}

/// Validate a QName and return an error if invalid
pub fn validate_qname(name: &str) -> Result<()> {
    if is_valid_qname(name) {
        Ok(())
    } else {
        Err(Error::Name(format!("Invalid QName: '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ncnames() {
        assert!(is_valid_ncname("element"));
        assert!(is_valid_ncname("_private"));
        assert!(is_valid_ncname("my-type.v2"));
        assert!(is_valid_ncname("Straße"));
    }

    #[test]
    fn test_invalid_ncnames() {
        assert!(!is_valid_ncname(""));
        assert!(!is_valid_ncname("1abc"));
        assert!(!is_valid_ncname("-abc"));
        assert!(!is_valid_ncname("xs:string"));
        assert!(!is_valid_ncname("has space"));
    }

    #[test]
    fn test_qnames() {
        assert!(is_valid_qname("xs:string"));
        assert!(is_valid_qname("string"));
        assert!(!is_valid_qname("xs:"));
        assert!(!is_valid_qname(":string"));
        assert!(!is_valid_qname("a:b:c"));
    }

    #[test]
    fn test_validate_errors() {
        assert!(validate_ncname("ok").is_ok());
        assert!(matches!(validate_ncname("no way"), Err(Error::Name(_))));
        assert!(matches!(validate_qname("a:b:c"), Err(Error::Name(_))));
    }
}
