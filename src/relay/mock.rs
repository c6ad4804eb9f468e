//! Mock relay for testing
//!
//! Records every message and answers from a script; with an empty script
//! every call succeeds.

use super::{AnonymousChatMessage, CardholderMessage, RelayClient, RelayError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MockState {
    chat: Vec<AnonymousChatMessage>,
    cardholder: Vec<CardholderMessage>,
    responses: VecDeque<Result<(), RelayError>>,
}

#[derive(Debug, Clone, Default)]
pub struct MockRelay {
    state: Arc<Mutex<MockState>>,
}

impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue the outcome of the next call
    pub fn push_response(&self, response: Result<(), RelayError>) {
        self.state().responses.push_back(response);
    }

    /// Chat messages received (including rejected ones)
    pub fn chat_messages(&self) -> Vec<AnonymousChatMessage> {
        self.state().chat.clone()
    }

    pub fn cardholder_messages(&self) -> Vec<CardholderMessage> {
        self.state().cardholder.clone()
    }

    fn next_response(state: &mut MockState) -> Result<(), RelayError> {
        state.responses.pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl RelayClient for MockRelay {
    async fn send_chat(&self, message: &AnonymousChatMessage) -> Result<(), RelayError> {
        let mut state = self.state();
        state.chat.push(message.clone());
        Self::next_response(&mut state)
    }

    async fn send_cardholder(&self, message: &CardholderMessage) -> Result<(), RelayError> {
        let mut state = self.state();
        state.cardholder.push(message.clone());
        Self::next_response(&mut state)
    }
}
