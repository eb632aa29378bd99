//! Tenant and owner conversations about a property.
//!
//! A chat document carries a preview of the last message and one unread
//! counter per party. Sending updates the message and the chat document in
//! one commit. Marking read is chunked to stay under the per-commit write
//! limit, and the counter is cleared with the last chunk.

use std::sync::{Arc, Mutex};

use tracing::{debug, info};
use ulid::{Generator, Ulid};

use crate::error::{Error, Result};
use crate::limits::{MAX_MESSAGE_LEN, MAX_WRITES_PER_COMMIT};
use crate::model::{now_ms, Chat, Message, MessageKind, Property, PropertyCard, SenderRole};
use crate::session::{Identity, Session, UserRole};
use crate::store::{paths, DocPath, Filter, Store, Subscription, Transaction};

fn role_in(chat: &Chat, email: &str) -> Result<SenderRole> {
    if chat.tenant_email == email {
        Ok(SenderRole::Tenant)
    } else if chat.owner_email == email {
        Ok(SenderRole::Owner)
    } else {
        Err(Error::PreconditionFailed(format!(
            "{email} is not part of chat {}",
            chat.id
        )))
    }
}

fn load_chat(txn: &mut Transaction<'_>, chat_id: &str) -> Result<Chat> {
    match txn.get(&paths::chat(chat_id)?) {
        Some(doc) => Ok(doc.decode()?),
        None => Err(Error::ChatNotFound(chat_id.to_string())),
    }
}

fn chronological(messages: &mut [Message]) {
    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
}

#[derive(Clone)]
pub struct ChatService {
    store: Arc<Store>,
    /// Monotonic so messages sent within one millisecond keep their order.
    ids: Arc<Mutex<Generator>>,
}

impl ChatService {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            ids: Arc::new(Mutex::new(Generator::new())),
        }
    }

    fn next_id(&self) -> String {
        let id = match self.ids.lock() {
            Ok(mut ids) => ids.generate().unwrap_or_else(|_| Ulid::new()),
            Err(_) => Ulid::new(),
        };
        id.to_string()
    }

    /// Open the tenant's chat about `property`, creating it with a property
    /// card as the first message if it does not exist yet.
    pub async fn create_or_get_chat(&self, session: &Session, property: &Property) -> Result<Chat> {
        let tenant = session.identity()?;
        if property.id.is_empty() || property.owner_id.is_empty() {
            return Err(Error::MissingPropertySnapshot("id"));
        }
        let chat_id = Chat::chat_id(&tenant.email, &property.owner_id, &property.id);
        let chat_path = paths::chat(&chat_id)?;
        if let Some(existing) = self.store.get_as::<Chat>(&chat_path)? {
            return Ok(existing);
        }

        let now = now_ms();
        let card_id = self.next_id();
        let (chat, created) = self
            .store
            .run_transaction(|txn| {
                if let Some(doc) = txn.get(&chat_path) {
                    return Ok((doc.decode::<Chat>()?, false));
                }
                let card = seed_message(&chat_id, &card_id, property, now);
                let chat = Chat {
                    id: chat_id.clone(),
                    tenant_email: tenant.email.clone(),
                    tenant_name: tenant.name.clone(),
                    owner_email: property.owner_id.clone(),
                    owner_name: property.owner_name.clone(),
                    property_id: property.id.clone(),
                    property_title: property.title.clone(),
                    property_location: property.display_location().to_string(),
                    last_message: card.message_text.clone(),
                    last_message_timestamp: now,
                    last_message_sender: SenderRole::System,
                    unread_count_tenant: 0,
                    unread_count_owner: 0,
                    created_at: now,
                    updated_at: now,
                    is_active: true,
                };
                txn.set_record(&chat_path, &chat)?;
                txn.set_record(&paths::message(&chat_id, &card.id)?, &card)?;
                Ok::<_, Error>((chat, true))
            })
            .await?;
        if created {
            info!("chat {chat_id} opened by {}", tenant.email);
        }
        Ok(chat)
    }

    /// Append a text message and bump the other party's unread counter.
    pub async fn send_message(&self, session: &Session, chat_id: &str, text: &str) -> Result<Message> {
        let sender = session.identity()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidRequest("empty message".into()));
        }
        if text.len() > MAX_MESSAGE_LEN {
            return Err(Error::InvalidRequest("message too long".into()));
        }

        let id = self.next_id();
        let now = now_ms();
        let message = self
            .store
            .run_transaction(|txn| {
                let mut chat = load_chat(txn, chat_id)?;
                let role = role_in(&chat, &sender.email)?;
                let message = Message {
                    id: id.clone(),
                    chat_id: chat_id.to_string(),
                    sender_email: sender.email.clone(),
                    sender_name: sender.name.clone(),
                    sender_type: role,
                    message_text: text.to_string(),
                    message_type: MessageKind::Text,
                    timestamp: now,
                    is_read: false,
                    property_data: None,
                };
                chat.last_message = message.message_text.clone();
                chat.last_message_timestamp = now;
                chat.last_message_sender = role;
                match role.counterpart() {
                    Some(SenderRole::Tenant) => chat.unread_count_tenant += 1,
                    Some(SenderRole::Owner) => chat.unread_count_owner += 1,
                    _ => {}
                }
                chat.updated_at = now;

                txn.set_record(&paths::message(chat_id, &message.id)?, &message)?;
                txn.set_record(&paths::chat(chat_id)?, &chat)?;
                Ok::<_, Error>(message)
            })
            .await?;

        metrics::counter!(crate::observability::MESSAGES_SENT_TOTAL).increment(1);
        debug!("message {} sent in chat {chat_id}", message.id);
        Ok(message)
    }

    /// The signed-in user's chats, most recent activity first.
    pub fn list_chats(&self, session: &Session) -> Result<Vec<Chat>> {
        let filter = Self::role_filter(session.identity()?);
        let mut chats = self
            .store
            .query(&paths::chats(), &filter)
            .iter()
            .map(|d| d.decode::<Chat>().map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;
        chats.sort_by(|a, b| {
            b.last_message_timestamp
                .cmp(&a.last_message_timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(chats)
    }

    /// All messages of a chat, oldest first.
    pub fn messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        if !self.store.exists(&paths::chat(chat_id)?) {
            return Err(Error::ChatNotFound(chat_id.to_string()));
        }
        let mut messages = self
            .store
            .list(&paths::messages(chat_id)?)
            .iter()
            .map(|d| d.decode::<Message>().map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;
        chronological(&mut messages);
        Ok(messages)
    }

    /// Mark everything the other side sent as read and clear the caller's
    /// unread counter. Returns how many messages changed.
    pub async fn mark_read(&self, session: &Session, chat_id: &str) -> Result<usize> {
        let email = session.email()?;
        let chat: Chat = self
            .store
            .get_as(&paths::chat(chat_id)?)?
            .ok_or_else(|| Error::ChatNotFound(chat_id.to_string()))?;
        let role = role_in(&chat, email)?;

        let unread: Vec<DocPath> = self
            .store
            .list(&paths::messages(chat_id)?)
            .into_iter()
            .filter(|doc| {
                doc.decode::<Message>()
                    .is_ok_and(|m| m.sender_type != role && !m.is_read)
            })
            .map(|doc| doc.path)
            .collect();

        // One slot per commit is kept for the chat document.
        let mut batches: Vec<&[DocPath]> = unread.chunks(MAX_WRITES_PER_COMMIT - 1).collect();
        if batches.is_empty() {
            batches.push(&[]);
        }
        let last = batches.len() - 1;

        let mut marked = 0;
        for (i, batch) in batches.into_iter().enumerate() {
            marked += self
                .store
                .run_transaction(|txn| {
                    let mut count = 0;
                    for path in batch {
                        let Some(doc) = txn.get(path) else { continue };
                        let message: Message = doc.decode()?;
                        if message.is_read {
                            continue;
                        }
                        let mut fields = doc.fields;
                        fields.insert("isRead".into(), serde_json::Value::Bool(true));
                        txn.set(path, fields);
                        count += 1;
                    }
                    if i == last {
                        let mut chat = load_chat(txn, chat_id)?;
                        match role {
                            SenderRole::Tenant => chat.unread_count_tenant = 0,
                            SenderRole::Owner => chat.unread_count_owner = 0,
                            SenderRole::System => {}
                        }
                        txn.set_record(&paths::chat(chat_id)?, &chat)?;
                    }
                    Ok::<_, Error>(count)
                })
                .await?;
        }
        debug!("{email} read {marked} messages in chat {chat_id}");
        Ok(marked)
    }

    /// Live message list of one chat. Drop the handle to stop listening.
    pub fn listen_messages(&self, chat_id: &str) -> Result<Subscription<Message>> {
        Ok(self
            .store
            .subscribe(paths::messages(chat_id)?, Filter::all()))
    }

    /// Live chat list of the signed-in user.
    pub fn listen_chats(&self, session: &Session) -> Result<Subscription<Chat>> {
        let filter = Self::role_filter(session.identity()?);
        Ok(self.store.subscribe(paths::chats(), filter))
    }

    fn role_filter(identity: &Identity) -> Filter {
        match identity.role {
            UserRole::Tenant => Filter::all().eq("tenantEmail", identity.email.as_str()),
            UserRole::Owner => Filter::all().eq("ownerEmail", identity.email.as_str()),
        }
    }
}

/// Sender shown on the property card that opens every chat.
pub const SYSTEM_SENDER_EMAIL: &str = "system";
pub const SYSTEM_SENDER_NAME: &str = "HousingHub";

fn seed_message(chat_id: &str, id: &str, property: &Property, now: i64) -> Message {
    Message {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        sender_email: SYSTEM_SENDER_EMAIL.to_string(),
        sender_name: SYSTEM_SENDER_NAME.to_string(),
        sender_type: SenderRole::System,
        message_text: format!("Property: {}", property.title),
        message_type: MessageKind::PropertyLink,
        timestamp: now,
        is_read: false,
        property_data: Some(PropertyCard {
            property_id: property.id.clone(),
            property_title: property.title.clone(),
            property_location: property.display_location().to_string(),
            property_price: property.price,
            property_image_url: property.images.first().cloned().unwrap_or_default(),
        }),
    }
}
