//! An in-process network that drives every participant of a protocol run.
#![allow(dead_code)]

use std::collections::BTreeMap;

use frost_ed25519_tss::{Message, ParticipantId, Protocol, Session};

/// How many advance-and-deliver sweeps [`pump`] performs. Two-round
/// protocols finish in three; the margin keeps stalled runs from looping
/// forever while letting aborted sessions settle.
const SWEEPS: usize = 10;

/// Repeatedly advances every session and delivers every produced message.
///
/// Aborted sessions simply stop participating; the caller inspects each
/// session's result afterwards.
pub fn pump<P: Protocol>(sessions: &BTreeMap<ParticipantId, Session<P>>) {
    pump_with(sessions, |_, bytes| bytes);
}

/// Like [`pump`], but passes every encoded message through `tamper` before
/// delivery, so tests can play a malicious network.
pub fn pump_with<P, F>(sessions: &BTreeMap<ParticipantId, Session<P>>, mut tamper: F)
where
    P: Protocol,
    F: FnMut(&Message, Vec<u8>) -> Vec<u8>,
{
    for _ in 0..SWEEPS {
        let mut deliveries = Vec::new();
        for (&from, session) in sessions {
            if session.is_done() {
                continue;
            }
            let outgoing = match session.advance() {
                Ok(messages) => messages,
                Err(_) => continue,
            };
            for message in outgoing {
                let bytes = tamper(&message, message.to_bytes());
                deliveries.push((from, message.recipient(), bytes));
            }
        }
        for (from, recipient, bytes) in deliveries {
            match recipient {
                Some(to) => {
                    if let Some(session) = sessions.get(&to) {
                        let _ = session.store_message(&bytes);
                    }
                }
                None => {
                    for (&to, session) in sessions {
                        if to != from {
                            let _ = session.store_message(&bytes);
                        }
                    }
                }
            }
        }
        if sessions.values().all(|session| session.is_done()) {
            break;
        }
    }
}
