//! Structural SRS decoding.
//!
//! Addresses look like `SRS0=HHH=TT=orig-domain=local` (or `SRS1=...`). Only
//! the positional fields are used: the hash and timestamp are never checked,
//! so any string with the right shape is trusted as a genuine rewrite.

use crate::address::{SRS0_PREFIX, SRS1_PREFIX};
use thiserror::Error;

const SRS_FIELDS: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SrsError {
    #[error("not an SRS address")]
    NotSrs,
    #[error("malformed SRS address: expected 5 '='-separated fields, found {0}")]
    TooFewFields(usize),
}

/// Decode an SRS0/SRS1 address into `local@original-domain`.
///
/// The fifth field may itself be a full address when a forwarder re-wrapped an
/// already rewritten sender; in that case its domain is dropped and the
/// original domain from the fourth field is used.
pub fn decode(srs: &str) -> Result<String, SrsError> {
    if !srs.starts_with(SRS0_PREFIX) && !srs.starts_with(SRS1_PREFIX) {
        return Err(SrsError::NotSrs);
    }

    let fields: Vec<&str> = srs.splitn(SRS_FIELDS, '=').collect();
    if fields.len() < SRS_FIELDS {
        return Err(SrsError::TooFewFields(fields.len()));
    }

    let domain = fields[3];
    let local = match fields[4].split_once('@') {
        Some((user, _forwarder)) => user,
        None => fields[4],
    };

    Ok(format!("{local}@{domain}"))
}
