use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use carelink_types::models::{ConversationSummary, Message};

use crate::error::{IndexError, Result};
use crate::store::{MessageStore, NewMessage};

/// Read/write views over a message log. Holds no state of its own beyond
/// the store handle; every view is recomputed per call.
pub struct ConversationIndex<S> {
    store: S,
}

/// Running aggregate for one partner while folding the log.
struct PartnerState {
    last_content: String,
    last_key: (i64, i64),
    unread: usize,
}

impl<S: MessageStore> ConversationIndex<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Append a message from `sender_id` to `receiver_id`.
    pub fn send(&self, sender_id: &str, receiver_id: &str, content: &str) -> Result<Message> {
        validate_participant("sender_id", sender_id)?;
        validate_participant("receiver_id", receiver_id)?;
        if sender_id == receiver_id {
            warn!("Rejected self-addressed message from {}", sender_id);
            return Err(IndexError::InvalidInput(
                "sender_id and receiver_id must differ".into(),
            ));
        }
        if content.trim().is_empty() {
            warn!("Rejected empty message from {} to {}", sender_id, receiver_id);
            return Err(IndexError::InvalidInput("content must not be empty".into()));
        }

        let message = self.store.append(NewMessage {
            id: Uuid::new_v4(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
        })?;

        debug!(
            "Message {} sent {} -> {} (seq {})",
            message.id, sender_id, receiver_id, message.seq
        );
        Ok(message)
    }

    /// Every message between the two users, oldest first. Symmetric in its arguments.
    pub fn transcript(&self, user_a: &str, user_b: &str) -> Result<Vec<Message>> {
        let mut messages = self.store.between(user_a, user_b)?;
        // Stable, so equal keys keep the store's insertion order
        messages.sort_by_key(Message::order_key);

        debug!(
            "Transcript {} <-> {}: {} messages",
            user_a,
            user_b,
            messages.len()
        );
        Ok(messages)
    }

    /// One summary per partner, most recently active first.
    pub fn inbox(&self, user_id: &str) -> Result<Vec<ConversationSummary>> {
        let messages = self.store.involving(user_id)?;

        let mut partners: HashMap<String, PartnerState> = HashMap::new();
        for m in &messages {
            let Some(partner) = m.partner_of(user_id) else {
                continue;
            };

            let state = partners
                .entry(partner.to_string())
                .or_insert_with(|| PartnerState {
                    last_content: m.content.clone(),
                    last_key: m.order_key(),
                    unread: 0,
                });

            if m.order_key() > state.last_key {
                state.last_content = m.content.clone();
                state.last_key = m.order_key();
            }

            // Counted independently of whether m is the newest message
            if m.receiver_id == user_id && !m.read {
                state.unread += 1;
            }
        }

        let mut entries: Vec<(String, PartnerState)> = partners.into_iter().collect();
        entries.sort_by(|(_, a), (_, b)| b.last_key.cmp(&a.last_key));

        debug!(
            "Inbox for {}: {} conversations from {} messages",
            user_id,
            entries.len(),
            messages.len()
        );

        Ok(entries
            .into_iter()
            .map(|(partner_id, state)| ConversationSummary {
                partner_id,
                last_message_content: state.last_content,
                last_message_time: state.last_key.0,
                unread_count: state.unread,
            })
            .collect())
    }

    /// Mark all unread `sender_id -> receiver_id` messages read.
    /// Returns the number that changed; 0 is not an error.
    pub fn mark_read(&self, sender_id: &str, receiver_id: &str) -> Result<usize> {
        let updated = self.store.mark_read(sender_id, receiver_id)?;
        debug!(
            "Marked {} messages read ({} -> {})",
            updated, sender_id, receiver_id
        );
        Ok(updated)
    }

    /// Total unread messages received by `user_id` across all partners.
    pub fn unread_count(&self, user_id: &str) -> Result<usize> {
        Ok(self.store.count_unread(user_id)?)
    }
}

fn validate_participant(field: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        warn!("Rejected message with blank {}", field);
        return Err(IndexError::InvalidInput(format!("{} must not be blank", field)));
    }
    Ok(())
}
