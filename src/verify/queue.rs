use std::collections::VecDeque;

use crate::mx::MailExchanger;

/// Exchangers still to be tried by one verification, most preferred first.
///
/// Consumed destructively: a popped candidate is never handed out again.
#[derive(Debug, Default)]
pub(crate) struct CandidateQueue {
    pending: VecDeque<MailExchanger>,
}

impl CandidateQueue {
    pub(crate) fn new(exchangers: Vec<MailExchanger>) -> Self {
        Self {
            pending: exchangers.into(),
        }
    }

    pub(crate) fn pop_front(&mut self) -> Option<MailExchanger> {
        self.pending.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
