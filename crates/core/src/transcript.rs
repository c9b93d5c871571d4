//! The conversation log.

use tonelink_model::{Message, Role};

/// An append-only, ordered log of role-tagged messages.
///
/// Index 0 is always the system message of the active persona. The log is
/// only ever replaced as a whole by [`Transcript::reset`], which also bumps
/// the epoch so that late writers can tell they target a discarded log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transcript {
    items: Vec<Message>,
    epoch: u64,
}

impl Transcript {
    /// Creates a transcript holding only the system message.
    #[inline]
    pub fn new<S: Into<String>>(system_prompt: S) -> Self {
        Self {
            items: vec![Message::system(system_prompt)],
            epoch: 0,
        }
    }

    /// Appends a user or assistant message.
    ///
    /// System messages are rejected, the persona prompt is only set through
    /// [`Transcript::reset`].
    pub fn push(&mut self, msg: Message) {
        if msg.role() == Role::System {
            warn!("refusing to append a system message mid-conversation");
            return;
        }
        self.items.push(msg);
    }

    /// Discards every message and starts over with a new system message.
    pub fn reset<S: Into<String>>(&mut self, system_prompt: S) {
        self.items.clear();
        self.items.push(Message::system(system_prompt));
        self.epoch += 1;
    }

    /// Returns all messages in insertion order.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.items
    }

    /// Returns an owned copy to hand to a provider.
    #[inline]
    pub fn snapshot(&self) -> Vec<Message> {
        self.items.clone()
    }

    /// Returns the number of messages, system message included.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always `false`, the system message is never removed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the most recent message.
    #[inline]
    pub fn last(&self) -> &Message {
        // The system message guarantees at least one element.
        &self.items[self.items.len() - 1]
    }

    /// Counts how many times the transcript has been reset.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}
