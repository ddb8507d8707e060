//! Conversation view model
//!
//! An ordered list of rendered entries: real messages plus transient pending
//! placeholders. The first entry is always the welcome message.

use crate::state::{Attachment, ChatMessage};

/// Identifies one entry for its whole lifetime. Ids are never reused, even
/// across resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Message(EntryId, ChatMessage),
    /// Placeholder shown while an exchange is outstanding
    Pending(EntryId),
}

impl Entry {
    pub fn id(&self) -> EntryId {
        match self {
            Entry::Message(id, _) | Entry::Pending(id) => *id,
        }
    }

    pub fn message(&self) -> Option<&ChatMessage> {
        match self {
            Entry::Message(_, message) => Some(message),
            Entry::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Entry::Pending(_))
    }
}

#[derive(Debug, Clone)]
pub struct Conversation {
    entries: Vec<Entry>,
    next_id: u64,
}

impl Conversation {
    pub fn new(welcome: impl Into<String>) -> Self {
        Self {
            entries: vec![Entry::Message(EntryId(0), ChatMessage::assistant(welcome))],
            next_id: 1,
        }
    }

    fn allocate(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn push_message(&mut self, message: ChatMessage) -> &Entry {
        let id = self.allocate();
        self.entries.push(Entry::Message(id, message));
        &self.entries[self.entries.len() - 1]
    }

    pub fn push_pending(&mut self) -> &Entry {
        let id = self.allocate();
        self.entries.push(Entry::Pending(id));
        &self.entries[self.entries.len() - 1]
    }

    /// Remove a specific entry. The welcome message can't be removed.
    /// Returns false when the entry is already gone.
    pub fn remove(&mut self, id: EntryId) -> bool {
        match self.entries.iter().skip(1).position(|e| e.id() == id) {
            Some(pos) => {
                self.entries.remove(pos + 1);
                true
            }
            None => false,
        }
    }

    /// Attach an image to a message that has none yet.
    pub fn attach(&mut self, id: EntryId, attachment: Attachment) -> bool {
        let Some(Entry::Message(_, message)) = self.entries.iter_mut().find(|e| e.id() == id)
        else {
            return false;
        };
        if message.attachment.is_some() {
            return false;
        }
        message.attachment = Some(attachment);
        true
    }

    /// Truncate to the welcome message, dropping every later entry.
    pub fn reset(&mut self) -> &Entry {
        self.entries.truncate(1);
        &self.entries[0]
    }

    pub fn welcome(&self) -> &Entry {
        &self.entries[0]
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter().filter_map(Entry::message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_pending()).count()
    }

    pub fn last_id(&self) -> EntryId {
        self.entries[self.entries.len() - 1].id()
    }
}
