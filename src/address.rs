//! Lexical classification of the addresses handed to the resolver.

/// Characters that never appear in an address we pass through untouched.
const FORBIDDEN_CHARS: &[char] = &[' ', '<', '>', '(', ')', ',', ';', '=', '"'];

pub const SRS0_PREFIX: &str = "SRS0=";
pub const SRS1_PREFIX: &str = "SRS1=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    CleanEmail,
    Srs0,
    Srs1,
    Unrecognized,
}

impl AddressKind {
    pub fn is_srs(&self) -> bool {
        matches!(self, AddressKind::Srs0 | AddressKind::Srs1)
    }
}

/// Classify an address. SRS prefixes win over email validation, so an SRS
/// string is never rejected for containing `=`.
pub fn classify(address: &str) -> AddressKind {
    if address.starts_with(SRS0_PREFIX) {
        AddressKind::Srs0
    } else if address.starts_with(SRS1_PREFIX) {
        AddressKind::Srs1
    } else if is_clean_email(address) {
        AddressKind::CleanEmail
    } else {
        AddressKind::Unrecognized
    }
}

pub fn is_clean_email(address: &str) -> bool {
    if address.contains(FORBIDDEN_CHARS) {
        return false;
    }

    if address.matches('@').count() != 1 {
        return false;
    }

    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.len() < 3 {
        return false;
    }

    domain.contains('.')
}
