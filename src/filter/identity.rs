//! Deterministic read identity
//!
//! Two reads whose filters canonicalize to the same expression, with the same
//! sort directive, share an identifier. The canonical form is framed into a
//! SHA-256 stream and emitted as lowercase hex.

use super::model::{FilterExpression, Scalar, SortDirective, SortOrder};
use sha2::{Digest, Sha256};
use std::fmt::Write;

const IDENTITY_PROFILE: &[u8] = b"lqid:v1";

/// Stable identifier for a filter expression and sort directive
pub fn identity(expression: &FilterExpression, sort: &SortDirective) -> String {
    let canonical = expression.canonicalize();
    let mut hasher = Sha256::new();
    hasher.update(IDENTITY_PROFILE);

    write_u32(&mut hasher, canonical.len() as u32);
    for clause in canonical.clauses() {
        write_str(&mut hasher, &clause.name);
        write_str(&mut hasher, clause.comparator.as_str());
        write_str(&mut hasher, clause.match_mode.as_str());
        write_u32(&mut hasher, clause.values.len() as u32);
        for value in &clause.values {
            write_scalar(&mut hasher, value);
        }
    }

    match &sort.order_by {
        Some(order_by) => {
            write_tag(&mut hasher, 0x01);
            write_str(&mut hasher, order_by);
        }
        None => write_tag(&mut hasher, 0x00),
    }
    write_tag(
        &mut hasher,
        match sort.order {
            SortOrder::Asc => 0x01,
            SortOrder::Desc => 0x02,
        },
    );

    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn write_scalar(hasher: &mut Sha256, value: &Scalar) {
    match value {
        Scalar::Int(v) => {
            write_tag(hasher, 0x10);
            hasher.update(v.to_be_bytes());
        }
        Scalar::String(v) => {
            write_tag(hasher, 0x11);
            write_str(hasher, v);
        }
        Scalar::Bool(v) => {
            write_tag(hasher, 0x12);
            write_tag(hasher, u8::from(*v));
        }
    }
}

fn write_str(hasher: &mut Sha256, value: &str) {
    write_u32(hasher, value.len() as u32);
    hasher.update(value.as_bytes());
}

fn write_u32(hasher: &mut Sha256, value: u32) {
    hasher.update(value.to_be_bytes());
}

fn write_tag(hasher: &mut Sha256, tag: u8) {
    hasher.update([tag]);
}
