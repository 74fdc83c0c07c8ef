#![allow(non_snake_case)]
#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

mod curve;
mod error;
pub mod keygen;
mod keys;
mod messages;
mod participant;
mod polynomial;
mod queue;
mod session;
pub mod sign;
mod signature;

pub use error::Error;
pub use keygen::{Keygen, KeygenOutput, KeygenSession};
pub use keys::{PublicKeyPackage, SecretShare, VerifyingKey, VerifyingShare};
pub use messages::{Message, MessageType};
pub use participant::{ParticipantId, ParticipantSet};
pub use session::{Protocol, Session};
pub use sign::{Sign, SignSession};
pub use signature::Signature;
