//! The round state machine shared by the key-generation and signing
//! protocols.
//!
//! A session walks each round through `ProcessMessages → ProcessRound →
//! GenerateMessages → NextRound`. The initial round has no peer messages and
//! starts at `ProcessRound`. Any error attributable to a peer aborts the
//! session; the first recorded fault and its culprit stay authoritative and
//! later faults are appended behind it. `Finished` and `Aborted` are
//! terminal.

use std::collections::BTreeSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::messages::{Message, MessageType};
use crate::participant::ParticipantId;
use crate::queue::MessageQueue;
use crate::Error;

pub(crate) mod private {
    /// Marker restricting [`super::Protocol`] to this crate's machines.
    pub trait Sealed {}
}

/// Lifecycle step of the current round.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Step {
    ProcessMessages,
    ProcessRound,
    GenerateMessages,
    NextRound,
    Finished,
    Aborted,
}

/// A multi-round protocol that can be driven by a [`Session`].
///
/// Implemented by the built-in key-generation and signing machines; the
/// trait is sealed and exists only so [`Session`] can be generic over them.
pub trait Protocol: private::Sealed {
    /// Value produced when the protocol completes.
    type Output: Clone;

    /// Handles one stored message of the current round.
    fn process_message(&mut self, message: Message) -> Result<(), Error>;

    /// Performs the cryptographic work of the current round.
    fn process_round(&mut self) -> Result<(), Error>;

    /// Produces the messages this participant must send for the current
    /// round.
    fn generate_messages(&mut self) -> Result<Vec<Message>, Error>;

    /// Moves to the next round, yielding the output after the last one.
    fn next_round(&mut self) -> Result<Option<Self::Output>, Error>;
}

struct State<P: Protocol> {
    self_id: ParticipantId,
    machine: P,
    queue: MessageQueue,
    step: Step,
    round_number: u16,
    processing: bool,
    outcome: Option<Result<P::Output, Error>>,
}

/// A running protocol instance.
///
/// Every public method takes `&self`: an internal lock serializes all entry
/// points, so a session can be shared between a transport thread calling
/// [`Session::store_message`] and a driver calling [`Session::advance`].
/// [`Session::wait`] blocks on a condition variable until the session
/// finishes or aborts.
pub struct Session<P: Protocol> {
    state: Mutex<State<P>>,
    finished: Condvar,
}

impl<P: Protocol> Session<P> {
    pub(crate) fn begin(
        self_id: ParticipantId,
        machine: P,
        senders: BTreeSet<ParticipantId>,
        accepted: Vec<MessageType>,
    ) -> Self {
        Self {
            state: Mutex::new(State {
                self_id,
                machine,
                queue: MessageQueue::new(senders, accepted),
                // The initial round has no peer messages to wait for.
                step: Step::ProcessRound,
                round_number: 0,
                processing: false,
                outcome: None,
            }),
            finished: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// This participant's identifier.
    pub fn self_id(&self) -> ParticipantId {
        self.lock().self_id
    }

    /// The current round number, starting at zero.
    pub fn round_number(&self) -> u16 {
        self.lock().round_number
    }

    /// Files a received wire message with the session.
    ///
    /// Decode and queue errors are returned to the caller and leave the
    /// session untouched: a stray or garbled packet must not kill the
    /// protocol. After an abort the sticky error is returned instead.
    pub fn store_message(&self, bytes: &[u8]) -> Result<(), Error> {
        let mut state = self.lock();
        if let Some(Err(error)) = &state.outcome {
            return Err(error.clone());
        }
        let message = Message::from_bytes(bytes)?;
        if message
            .recipient()
            .is_some_and(|recipient| recipient != state.self_id)
        {
            return Err(Error::WrongRecipient);
        }
        state.queue.store(message)
    }

    /// Runs every step whose preconditions currently hold and returns the
    /// messages that must be sent out.
    ///
    /// The pump is idempotent: a round whose peer messages have not all
    /// arrived yet is left alone and picked up by a later call. When a peer
    /// fault is detected the session aborts and the error is returned, here
    /// and on every subsequent call.
    pub fn advance(&self) -> Result<Vec<Message>, Error> {
        let mut state = self.lock();
        if let Some(Err(error)) = &state.outcome {
            return Err(error.clone());
        }
        let mut outgoing = Vec::new();
        loop {
            match state.step {
                Step::ProcessMessages if state.queue.received_all() && !state.processing => {
                    state.processing = true;
                    // The whole batch is examined so that every faulty peer
                    // of the round ends up in the abort record.
                    let mut aborted = None;
                    for message in state.queue.take_messages() {
                        if let Err(error) = state.machine.process_message(message) {
                            aborted = Some(self.abort(&mut state, error));
                        }
                    }
                    if let Some(error) = aborted {
                        return Err(error);
                    }
                    state.queue.next_round();
                    state.processing = false;
                    state.step = Step::ProcessRound;
                }
                Step::ProcessRound if !state.processing => {
                    state.processing = true;
                    if let Err(error) = state.machine.process_round() {
                        return Err(self.abort(&mut state, error));
                    }
                    state.processing = false;
                    state.step = Step::GenerateMessages;
                }
                Step::GenerateMessages if !state.processing => {
                    state.processing = true;
                    match state.machine.generate_messages() {
                        Ok(messages) => outgoing.extend(messages),
                        Err(error) => return Err(self.abort(&mut state, error)),
                    }
                    state.processing = false;
                    state.step = Step::NextRound;
                }
                Step::NextRound => match state.machine.next_round() {
                    Ok(Some(output)) => {
                        debug!(
                            "participant {}: finished after round {}",
                            state.self_id, state.round_number
                        );
                        state.step = Step::Finished;
                        state.outcome = Some(Ok(output));
                        self.finished.notify_all();
                    }
                    Ok(None) => {
                        state.round_number += 1;
                        state.step = Step::ProcessMessages;
                        debug!(
                            "participant {}: entering round {}",
                            state.self_id, state.round_number
                        );
                    }
                    Err(error) => return Err(self.abort(&mut state, error)),
                },
                _ => break,
            }
        }
        Ok(outgoing)
    }

    /// Aborts the session with [`Error::Canceled`] and wakes all waiters.
    ///
    /// A canceled session yields no output; partial round state is discarded
    /// when the session is dropped.
    pub fn cancel(&self) {
        let mut state = self.lock();
        if state.outcome.is_none() {
            let _ = self.abort(&mut state, Error::Canceled);
        }
    }

    /// True once the session has finished or aborted.
    pub fn is_done(&self) -> bool {
        self.lock().outcome.is_some()
    }

    /// The session outcome, if the session is already done.
    pub fn try_result(&self) -> Option<Result<P::Output, Error>> {
        self.lock().outcome.clone()
    }

    /// Blocks until the session is done, then returns the output or the
    /// sticky error.
    pub fn wait(&self) -> Result<P::Output, Error> {
        let mut state = self.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return outcome.clone();
            }
            state = self
                .finished
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Records the first error, moves to `Aborted` and wakes waiters.
    /// Later faults are appended to the record; the first fault and its
    /// culprit stay authoritative.
    fn abort(&self, state: &mut State<P>, error: Error) -> Error {
        state.processing = false;
        if let Some(Err(first)) = &mut state.outcome {
            debug!("session already aborted; appending fault: {error}");
            *first = first.clone().chain(error);
            return first.clone();
        }
        match error.culprit() {
            Some(culprit) => warn!(
                "participant {}: aborting, culprit {culprit}: {error}",
                state.self_id
            ),
            None => warn!("participant {}: aborting: {error}", state.self_id),
        }
        state.step = Step::Aborted;
        state.outcome = Some(Err(error.clone()));
        self.finished.notify_all();
        error
    }
}
