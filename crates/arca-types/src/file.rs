//! File descriptors attached to storage orders.
//!
//! The fingerprint doubles as a public input of the possession proof, so it
//! must be a canonical element of the proof system's scalar field (BN254).

use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};

/// BN254 scalar field modulus, big-endian.
pub const FIELD_MODULUS: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Content fingerprint as a big-endian field element.
    #[serde(with = "hex::serde")]
    pub fingerprint: [u8; 32],
    /// Where replicas fetch the content from (CID, URL, ...).
    pub locator: String,
}

impl FileDescriptor {
    pub fn new(fingerprint: [u8; 32], locator: impl Into<String>) -> Self {
        Self {
            fingerprint,
            locator: locator.into(),
        }
    }

    /// Builds a descriptor whose fingerprint is the blake3 digest of `content`
    /// reduced into the field by clearing the top bits.
    pub fn from_content(content: &[u8], locator: impl Into<String>) -> Self {
        let mut fingerprint: [u8; 32] = blake3::hash(content).into();
        fingerprint[0] &= 0x1f;
        Self::new(fingerprint, locator)
    }

    pub fn is_in_field(&self) -> bool {
        // Lexicographic comparison of equal-length big-endian arrays is numeric.
        self.fingerprint < FIELD_MODULUS
    }

    pub fn validate(&self) -> Result<()> {
        if !self.is_in_field() {
            return Err(TypesError::FingerprintOutOfField(hex::encode(
                self.fingerprint,
            )));
        }
        if self.locator.is_empty() {
            return Err(TypesError::EmptyLocator);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_boundary() {
        let mut below = FIELD_MODULUS;
        below[31] = 0x00;
        assert!(FileDescriptor::new(below, "cid").validate().is_ok());

        let at = FileDescriptor::new(FIELD_MODULUS, "cid");
        assert!(matches!(
            at.validate(),
            Err(TypesError::FingerprintOutOfField(_))
        ));

        let above = FileDescriptor::new([0xff; 32], "cid");
        assert!(!above.is_in_field());
    }

    #[test]
    fn test_from_content_is_in_field() {
        for i in 0..64u8 {
            let file = FileDescriptor::from_content(&[i; 17], "bafy");
            assert!(file.is_in_field());
        }
    }

    #[test]
    fn test_empty_locator_rejected() {
        let file = FileDescriptor::new([0u8; 32], "");
        assert_eq!(file.validate(), Err(TypesError::EmptyLocator));
    }
}
