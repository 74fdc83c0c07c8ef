//! Schnorr signatures in the Ed25519 wire format.

use core::fmt;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;

use crate::curve::{self, POINT_LENGTH};
use crate::Error;

/// A Schnorr signature `(R, z)`.
///
/// The 64-byte wire form `R ‖ z` is identical to an ordinary Ed25519
/// signature, and a signature produced by a signing session verifies under
/// the group key with any stock Ed25519 verifier.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Signature {
    /// The commitment to the signature nonce.
    pub(crate) R: EdwardsPoint,
    /// The response to the challenge derived from `R`, the verifying key and
    /// the message.
    pub(crate) z: Scalar,
}

impl Signature {
    /// Byte length of an encoded signature.
    pub const LENGTH: usize = 64;

    /// Encodes the signature as `R ‖ z`.
    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        let mut bytes = [0u8; Self::LENGTH];
        bytes[..POINT_LENGTH].copy_from_slice(&curve::serialize_point(&self.R));
        bytes[POINT_LENGTH..].copy_from_slice(&curve::serialize_scalar(&self.z));
        bytes
    }

    /// Decodes a signature, validating both components.
    pub fn from_bytes(bytes: &[u8; Self::LENGTH]) -> Result<Self, Error> {
        let (R_bytes, z_bytes) = bytes.split_at(POINT_LENGTH);
        let R_bytes: [u8; 32] = R_bytes.try_into().map_err(|_| Error::Malformed)?;
        let z_bytes: [u8; 32] = z_bytes.try_into().map_err(|_| Error::Malformed)?;
        Ok(Self {
            R: curve::deserialize_point(&R_bytes)?,
            z: curve::deserialize_scalar(&z_bytes)?,
        })
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("R", &hex::encode(curve::serialize_point(&self.R)))
            .field("z", &hex::encode(curve::serialize_scalar(&self.z)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let signature = Signature {
            R: EdwardsPoint::mul_base(&Scalar::from(4_u64)),
            z: Scalar::from(5_u64),
        };
        let decoded = Signature::from_bytes(&signature.to_bytes()).unwrap();
        assert_eq!(signature, decoded);
    }

    #[test]
    fn rejects_unreduced_response() {
        let signature = Signature {
            R: EdwardsPoint::mul_base(&Scalar::from(4_u64)),
            z: Scalar::from(5_u64),
        };
        let mut bytes = signature.to_bytes();
        for byte in bytes[POINT_LENGTH..].iter_mut() {
            *byte = 0xff;
        }
        assert_eq!(Signature::from_bytes(&bytes), Err(Error::InvalidEncoding));
    }
}
