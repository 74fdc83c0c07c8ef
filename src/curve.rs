//! Thin adapter over the edwards25519 group from [`curve25519_dalek`].
//!
//! All scalar and point encodings that cross the wire go through the
//! canonical decoders in this module. Equality on scalars and points uses
//! `curve25519_dalek`'s constant-time comparisons.

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::IsIdentity;
use sha2::{Digest, Sha512};

use crate::Error;

/// Byte length of an encoded scalar.
pub(crate) const SCALAR_LENGTH: usize = 32;

/// Byte length of a compressed point.
pub(crate) const POINT_LENGTH: usize = 32;

/// Encodes a scalar in its canonical 32-byte little-endian form.
pub(crate) fn serialize_scalar(scalar: &Scalar) -> [u8; SCALAR_LENGTH] {
    scalar.to_bytes()
}

/// Decodes a scalar, rejecting encodings that are not fully reduced.
pub(crate) fn deserialize_scalar(bytes: &[u8; SCALAR_LENGTH]) -> Result<Scalar, Error> {
    Option::from(Scalar::from_canonical_bytes(*bytes)).ok_or(Error::InvalidEncoding)
}

/// Encodes a point in its compressed 32-byte form.
pub(crate) fn serialize_point(point: &EdwardsPoint) -> [u8; POINT_LENGTH] {
    point.compress().to_bytes()
}

/// Decodes a compressed point, rejecting the identity and any element that is
/// not torsion free.
///
/// Rejecting non-prime-order elements also rejects every non-canonical
/// encoding: the encodable non-canonical points are all of small or mixed
/// order (<https://eprint.iacr.org/2020/1244.pdf>).
pub(crate) fn deserialize_point(bytes: &[u8; POINT_LENGTH]) -> Result<EdwardsPoint, Error> {
    let point = CompressedEdwardsY(*bytes)
        .decompress()
        .ok_or(Error::InvalidEncoding)?;
    if point.is_identity() || !point.is_torsion_free() {
        return Err(Error::InvalidEncoding);
    }
    Ok(point)
}

fn hash_to_array(inputs: &[&[u8]]) -> [u8; 64] {
    let mut h = Sha512::new();
    for i in inputs {
        h.update(i);
    }
    let mut output = [0u8; 64];
    output.copy_from_slice(h.finalize().as_slice());
    output
}

/// Hashes `inputs` with SHA-512 and reduces the 64-byte digest to a scalar.
pub(crate) fn hash_to_scalar(inputs: &[&[u8]]) -> Scalar {
    Scalar::from_bytes_mod_order_wide(&hash_to_array(inputs))
}

/// The standard Ed25519 challenge `H(R ‖ A ‖ M)`.
pub(crate) fn challenge(R: &EdwardsPoint, verifying_key: &EdwardsPoint, msg: &[u8]) -> Scalar {
    hash_to_scalar(&[
        &serialize_point(R),
        &serialize_point(verifying_key),
        msg,
    ])
}
