//! Secret polynomials and their exponent commitments.

use core::fmt;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand_core::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::Error;

/// A secret polynomial `f(x) = a_0 + a_1·x + … + a_t·x^t` over the scalar
/// field.
///
/// The constant term `a_0` is the dealt secret. Coefficients are wiped when
/// the polynomial is dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct Polynomial {
    coefficients: Vec<Scalar>,
}

impl Polynomial {
    /// Samples a degree-`threshold` polynomial with the given constant term.
    pub(crate) fn sample<R: RngCore + CryptoRng>(
        threshold: u16,
        constant: Scalar,
        rng: &mut R,
    ) -> Self {
        let mut coefficients = Vec::with_capacity(threshold as usize + 1);
        coefficients.push(constant);
        for _ in 0..threshold {
            coefficients.push(Scalar::random(rng));
        }
        Self { coefficients }
    }

    /// The dealt secret `a_0`.
    pub(crate) fn constant(&self) -> &Scalar {
        &self.coefficients[0]
    }

    /// Evaluates `f(x)` by Horner's rule.
    pub(crate) fn evaluate(&self, x: &Scalar) -> Scalar {
        let mut value = Scalar::ZERO;
        for coefficient in self.coefficients.iter().rev() {
            value = value * x + coefficient;
        }
        value
    }

    /// Commits to every coefficient in the group: `A_j = [a_j]B`.
    pub(crate) fn commit(&self) -> VssCommitment {
        VssCommitment {
            coefficients: self.coefficients.iter().map(EdwardsPoint::mul_base).collect(),
        }
    }
}

impl fmt::Debug for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Polynomial")
            .field("degree", &(self.coefficients.len().saturating_sub(1)))
            .field("coefficients", &"<redacted>")
            .finish()
    }
}

/// The exponent form `[A_0, …, A_t]` of a secret polynomial.
///
/// Broadcast by each dealer so that recipients can verify the shares they
/// receive against it. Evaluating it at `x` yields `[f(x)]B` without
/// revealing `f`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct VssCommitment {
    coefficients: Vec<EdwardsPoint>,
}

impl VssCommitment {
    pub(crate) fn new(coefficients: Vec<EdwardsPoint>) -> Self {
        Self { coefficients }
    }

    /// `A_0`, the commitment to the dealt secret.
    pub(crate) fn constant(&self) -> &EdwardsPoint {
        &self.coefficients[0]
    }

    pub(crate) fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub(crate) fn coefficients(&self) -> &[EdwardsPoint] {
        &self.coefficients
    }

    /// Evaluates the committed polynomial in the exponent, `[f(x)]B`, by
    /// Horner's rule.
    pub(crate) fn evaluate(&self, x: &Scalar) -> EdwardsPoint {
        let mut value = EdwardsPoint::identity();
        for coefficient in self.coefficients.iter().rev() {
            value = value * x + coefficient;
        }
        value
    }

    /// Coefficient-wise sum of commitments of equal degree.
    pub(crate) fn sum<'a, I>(commitments: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = &'a VssCommitment>,
    {
        let mut iter = commitments.into_iter();
        let mut sum = iter.next().ok_or(Error::InvalidParticipants)?.clone();
        for commitment in iter {
            if commitment.len() != sum.len() {
                return Err(Error::InvalidParticipants);
            }
            for (acc, coefficient) in sum.coefficients.iter_mut().zip(&commitment.coefficients) {
                *acc += coefficient;
            }
        }
        Ok(sum)
    }
}

/// The verifiable-secret-sharing check: accepts `share` as the evaluation of
/// the committed polynomial at `x` iff `[share]B == [f(x)]B`.
pub(crate) fn verify_share(share: &Scalar, commitment: &VssCommitment, x: &Scalar) -> bool {
    EdwardsPoint::mul_base(share) == commitment.evaluate(x)
}
