//! The token: grant vector (`LN`) and pending queue.
//!
//! Possession of the token authorizes entry into the critical section. The
//! token is created once per system and then only ever moves: it does not
//! implement `Clone`, so at any instant it is owned by exactly one process
//! (or by the transport carrying it between two processes).
//!
//! The token never decides where it goes next. Its holder calls
//! [`Token::admit_if_eligible`] and [`Token::next_grantee`] and performs the
//! transfer itself.

use std::collections::VecDeque;

use kasami_proto::TokenPayload;

use crate::{error::ProcessError, types::ProcessId};

/// The mutual-exclusion token
///
/// # Invariants
///
/// - `grants[j]` (`LN[j]`) never decreases.
/// - The pending queue holds distinct process ids; `queued` mirrors its
///   membership so the duplicate check is O(1).
/// - An id leaves the queue exactly once, through [`Token::next_grantee`].
///
/// # Panics
///
/// Methods taking a [`ProcessId`] index by [`ProcessId::index`] and panic on
/// ids outside the token. The process state machine validates ids before
/// calling in, and [`Token::from_payload`] rejects tokens of the wrong size.
#[derive(Debug, PartialEq, Eq)]
pub struct Token {
    grants: Vec<u64>,
    pending: VecDeque<ProcessId>,
    queued: Vec<bool>,
}

impl Token {
    /// Fresh token: `LN` all zero, empty queue.
    #[must_use]
    pub fn new(process_count: usize) -> Self {
        Self {
            grants: vec![0; process_count],
            pending: VecDeque::new(),
            queued: vec![false; process_count],
        }
    }

    /// Number of processes the grant vector covers
    #[must_use]
    pub fn process_count(&self) -> usize {
        self.grants.len()
    }

    /// The grant vector, indexed by process id
    #[must_use]
    pub fn grants(&self) -> &[u64] {
        &self.grants
    }

    /// `LN[id]`: the last request of `id` satisfied by a grant
    ///
    /// # Panics
    ///
    /// Panics if `id` is outside the token's process range.
    #[must_use]
    pub fn granted(&self, id: ProcessId) -> u64 {
        self.grants[id.index()]
    }

    /// Pending queue, head first
    pub fn pending(&self) -> impl ExactSizeIterator<Item = ProcessId> + '_ {
        self.pending.iter().copied()
    }

    /// Whether `id` is waiting in the pending queue
    ///
    /// # Panics
    ///
    /// Panics if `id` is outside the token's process range.
    #[must_use]
    pub fn is_pending(&self, id: ProcessId) -> bool {
        self.queued[id.index()]
    }

    /// Whether request number `their_rn` of `id` is the next one to grant.
    ///
    /// This is the admission test: only the request exactly one past the last
    /// grant qualifies. Requests further ahead wait for a later sweep.
    ///
    /// # Panics
    ///
    /// Panics if `id` is outside the token's process range.
    #[must_use]
    pub fn is_eligible(&self, id: ProcessId, their_rn: u64) -> bool {
        self.granted(id).checked_add(1) == Some(their_rn)
    }

    /// Record that the holder's own latest request is satisfied:
    /// `LN[self_id] = rn_self`.
    ///
    /// A value below the current grant is ignored so the grant vector stays
    /// monotonic.
    ///
    /// # Panics
    ///
    /// Panics if `self_id` is outside the token's process range.
    pub fn record_own_grant(&mut self, self_id: ProcessId, rn_self: u64) {
        let entry = &mut self.grants[self_id.index()];
        if rn_self > *entry {
            *entry = rn_self;
        }
    }

    /// Enqueue `id` iff `their_rn == LN[id] + 1` and `id` is not already
    /// queued. Returns whether the queue changed.
    ///
    /// Repeated calls with the same arguments leave the queue as the first
    /// call did.
    ///
    /// # Panics
    ///
    /// Panics if `id` is outside the token's process range.
    pub fn admit_if_eligible(&mut self, id: ProcessId, their_rn: u64) -> bool {
        if self.queued[id.index()] || !self.is_eligible(id, their_rn) {
            return false;
        }

        self.queued[id.index()] = true;
        self.pending.push_back(id);
        true
    }

    /// Dequeue the head of the pending queue.
    pub fn next_grantee(&mut self) -> Option<ProcessId> {
        let next = self.pending.pop_front()?;
        self.queued[next.index()] = false;
        Some(next)
    }

    /// Wire representation of the token's state
    #[must_use]
    pub fn to_payload(&self) -> TokenPayload {
        TokenPayload {
            grants: self.grants.clone(),
            pending: self.pending.iter().map(|id| id.as_u32()).collect(),
        }
    }

    /// Rebuild a token received from the wire.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::MalformedToken`] if the grant vector does not
    /// cover exactly `process_count` processes, or the pending queue names an
    /// unknown process or the same process twice.
    pub fn from_payload(payload: TokenPayload, process_count: usize) -> Result<Self, ProcessError> {
        if payload.grants.len() != process_count {
            return Err(ProcessError::MalformedToken(format!(
                "grant vector covers {} processes, expected {}",
                payload.grants.len(),
                process_count
            )));
        }

        let mut token = Self {
            grants: payload.grants,
            pending: VecDeque::with_capacity(payload.pending.len()),
            queued: vec![false; process_count],
        };

        for raw in payload.pending {
            let id = ProcessId::checked(raw, process_count).ok_or_else(|| {
                ProcessError::MalformedToken(format!("pending queue names unknown process {raw}"))
            })?;

            if token.queued[id.index()] {
                return Err(ProcessError::MalformedToken(format!(
                    "pending queue contains {id} twice"
                )));
            }

            token.queued[id.index()] = true;
            token.pending.push_back(id);
        }

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: u32) -> ProcessId {
        ProcessId::new(raw)
    }

    #[test]
    fn new_token_is_empty() {
        let token = Token::new(3);
        assert_eq!(token.grants(), &[0, 0, 0]);
        assert_eq!(token.pending().len(), 0);
    }

    #[test]
    fn admits_only_next_request() {
        let mut token = Token::new(3);

        assert!(!token.admit_if_eligible(p(1), 0), "already satisfied");
        assert!(!token.admit_if_eligible(p(1), 2), "ahead of the next grant");
        assert!(token.admit_if_eligible(p(1), 1));
        assert!(token.is_pending(p(1)));
    }

    #[test]
    fn admission_is_idempotent() {
        let mut token = Token::new(2);

        assert!(token.admit_if_eligible(p(1), 1));
        assert!(!token.admit_if_eligible(p(1), 1));

        assert_eq!(token.pending().collect::<Vec<_>>(), vec![p(1)]);
    }

    #[test]
    fn grantees_leave_in_fifo_order() {
        let mut token = Token::new(4);
        token.admit_if_eligible(p(2), 1);
        token.admit_if_eligible(p(1), 1);
        token.admit_if_eligible(p(3), 1);

        assert_eq!(token.next_grantee(), Some(p(2)));
        assert_eq!(token.next_grantee(), Some(p(1)));
        assert_eq!(token.next_grantee(), Some(p(3)));
        assert_eq!(token.next_grantee(), None);
        assert!(!token.is_pending(p(2)));
    }

    #[test]
    fn dequeued_process_can_be_admitted_again() {
        let mut token = Token::new(2);
        token.admit_if_eligible(p(1), 1);
        assert_eq!(token.next_grantee(), Some(p(1)));

        token.record_own_grant(p(1), 1);
        assert!(token.admit_if_eligible(p(1), 2));
    }

    #[test]
    fn record_own_grant_sets_entry() {
        let mut token = Token::new(2);
        token.record_own_grant(p(0), 4);
        assert_eq!(token.granted(p(0)), 4);
        assert!(token.is_eligible(p(0), 5));
    }

    #[test]
    fn payload_round_trip_preserves_queue_order() {
        let mut token = Token::new(3);
        token.record_own_grant(p(0), 2);
        token.admit_if_eligible(p(2), 1);
        token.admit_if_eligible(p(1), 1);

        let rebuilt = Token::from_payload(token.to_payload(), 3).expect("valid payload");
        assert_eq!(rebuilt, token);
    }

    #[test]
    fn from_payload_rejects_wrong_dimension() {
        let payload = TokenPayload { grants: vec![0, 0], pending: vec![] };
        assert!(matches!(Token::from_payload(payload, 3), Err(ProcessError::MalformedToken(_))));
    }

    #[test]
    fn from_payload_rejects_unknown_pending() {
        let payload = TokenPayload { grants: vec![0, 0], pending: vec![5] };
        assert!(matches!(Token::from_payload(payload, 2), Err(ProcessError::MalformedToken(_))));
    }

    #[test]
    fn from_payload_rejects_duplicate_pending() {
        let payload = TokenPayload { grants: vec![0, 0, 0], pending: vec![1, 2, 1] };
        assert!(matches!(Token::from_payload(payload, 3), Err(ProcessError::MalformedToken(_))));
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn admission_panics_on_unknown_process() {
        let mut token = Token::new(2);
        token.admit_if_eligible(p(2), 1);
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn own_grant_panics_on_unknown_process() {
        let mut token = Token::new(2);
        token.record_own_grant(p(5), 1);
    }
}
