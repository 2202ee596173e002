//! Farming chatbot - Conversations with an LLM that answers in the farmer's
//! language, optionally read aloud.
//!
//! Each exchange stores the user message first, so a provider failure never
//! loses what the farmer typed.

use crate::{
    config::Settings,
    core::voice,
    entities::{ChatFeedback, ChatMessage, ChatRole, Conversation, chat_feedback, chat_message, conversation},
    errors::{Error, Result},
    providers::{ChatRequest, ChatTurn, LlmProvider, Providers},
};
use chrono::Utc;
use sea_orm::{PaginatorTrait, QueryOrder, QuerySelect, Set, prelude::*};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Messages of history sent with each request, the new one included.
pub const HISTORY_LIMIT: u64 = 15;
/// Length of an automatic conversation title, in characters.
pub const TITLE_CHARS: usize = 50;
/// Conversations returned by the recent-active shortcut.
pub const RECENT_ACTIVE_LIMIT: u64 = 10;
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 2000;

pub const SYSTEM_PROMPT: &str = "You are Kisan Sathi, an agricultural assistant for farmers in \
India with a focus on Karnataka. Give accurate, safe and practical advice in simple language.\n\
You help with crop diseases and pests, fertilizer doses, irrigation, soil health, weather-based \
planning, seeds, post-harvest handling, organic methods and government schemes.\n\
When diagnosing a problem, structure the answer as: the problem, what is happening, the \
solution (organic first, chemical only when needed with product and exact dose), how to apply \
it (quantity, timing, method, frequency), approximate cost per acre in rupees, and how to \
prevent it next season.\n\
Reply in the same language the farmer used and never mix Kannada and English in one reply. \
Recommend only chemicals approved in India, mention protective equipment for sprays, and \
suggest the local Krishi Vigyan Kendra when a field visit is needed.";

const KANNADA_INSTRUCTION: &str = "[IMPORTANT: User is asking in KANNADA. Reply FULLY in KANNADA \
only. Do not use English words. Keep the structure and units in Kannada.]";
const ENGLISH_INSTRUCTION: &str = "[IMPORTANT: User is asking in ENGLISH. Reply FULLY in ENGLISH \
only. Do not use Kannada words.]";

/// `kn` when Kannada letters strictly outnumber ASCII letters, else `en`.
#[must_use]
pub fn detect_language(text: &str) -> &'static str {
    let kannada = text.chars().filter(|c| ('\u{0C80}'..='\u{0CFF}').contains(c)).count();
    let latin = text.chars().filter(char::is_ascii_alphabetic).count();
    if kannada > latin { "kn" } else { "en" }
}

#[must_use]
pub fn language_instruction(language: &str) -> &'static str {
    if language == "kn" {
        KANNADA_INSTRUCTION
    } else {
        ENGLISH_INSTRUCTION
    }
}

/// First [`TITLE_CHARS`] characters of the message.
#[must_use]
pub fn title_from(message: &str) -> String {
    message.trim().chars().take(TITLE_CHARS).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessage {
    pub message: String,
    #[serde(default)]
    pub generate_audio: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatExchange {
    pub user_message: chat_message::Model,
    pub ai_response: chat_message::Model,
    pub tokens_used: i32,
    pub response_time_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuickReply {
    pub response: String,
    pub language: &'static str,
    pub tokens_used: i32,
    pub response_time_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: conversation::Model,
    pub messages: Vec<chat_message::Model>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackInput {
    pub message_id: i64,
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatStatistics {
    pub total_conversations: u64,
    pub active_conversations: u64,
    pub total_messages: u64,
    pub total_tokens_used: i64,
    pub avg_response_time_ms: f64,
    pub feedback_count: u64,
    pub avg_rating: f64,
}

fn context(history: Vec<chat_message::Model>, language: &str) -> Vec<ChatTurn> {
    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(ChatTurn::new(ChatRole::System, SYSTEM_PROMPT));
    turns.push(ChatTurn::new(ChatRole::System, language_instruction(language)));
    turns.extend(history.into_iter().map(|m| ChatTurn::new(m.role, m.content)));
    turns
}

async fn ask(llm: &dyn LlmProvider, messages: Vec<ChatTurn>) -> Result<(String, i32, i64)> {
    let started = Instant::now();
    let response = llm
        .chat(ChatRequest {
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        })
        .await?;
    let elapsed = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
    let tokens = i32::try_from(response.tokens_used).unwrap_or(i32::MAX);
    Ok((response.text.trim().to_string(), tokens, elapsed))
}

async fn owned_conversation(db: &DatabaseConnection, user_id: i64, id: i64) -> Result<conversation::Model> {
    Conversation::find_by_id(id)
        .filter(conversation::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Conversation", id))
}

async fn store_message(
    db: &DatabaseConnection,
    conversation_id: i64,
    role: ChatRole,
    content: String,
    tokens_used: i32,
    response_time_ms: i64,
) -> Result<chat_message::Model> {
    chat_message::ActiveModel {
        conversation_id: Set(conversation_id),
        role: Set(role),
        content: Set(content),
        tokens_used: Set(tokens_used),
        response_time_ms: Set(response_time_ms),
        timestamp: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

pub async fn create_conversation(
    db: &DatabaseConnection,
    user_id: i64,
    title: Option<String>,
) -> Result<conversation::Model> {
    let now = Utc::now();
    conversation::ActiveModel {
        user_id: Set(user_id),
        title: Set(title.as_deref().map(title_from).unwrap_or_default()),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Active conversations, most recently used first.
pub async fn list_conversations(db: &DatabaseConnection, user_id: i64) -> Result<Vec<conversation::Model>> {
    Conversation::find()
        .filter(conversation::Column::UserId.eq(user_id))
        .filter(conversation::Column::IsActive.eq(true))
        .order_by_desc(conversation::Column::UpdatedAt)
        .order_by_desc(conversation::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

pub async fn get_conversation(db: &DatabaseConnection, user_id: i64, id: i64) -> Result<ConversationDetail> {
    let conversation = owned_conversation(db, user_id, id).await?;
    let messages = ChatMessage::find()
        .filter(chat_message::Column::ConversationId.eq(id))
        .order_by_asc(chat_message::Column::Timestamp)
        .order_by_asc(chat_message::Column::Id)
        .all(db)
        .await?;
    Ok(ConversationDetail { conversation, messages })
}

pub async fn archive_conversation(db: &DatabaseConnection, user_id: i64, id: i64) -> Result<conversation::Model> {
    let existing = owned_conversation(db, user_id, id).await?;
    let mut active: conversation::ActiveModel = existing.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// The most recently used active conversations, at most [`RECENT_ACTIVE_LIMIT`].
pub async fn active_conversations(db: &DatabaseConnection, user_id: i64) -> Result<Vec<conversation::Model>> {
    Conversation::find()
        .filter(conversation::Column::UserId.eq(user_id))
        .filter(conversation::Column::IsActive.eq(true))
        .order_by_desc(conversation::Column::UpdatedAt)
        .order_by_desc(conversation::Column::Id)
        .limit(RECENT_ACTIVE_LIMIT)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Messages across the caller's conversations, archived ones included.
/// `conversation` narrows the listing to one conversation, which must be the
/// caller's.
pub async fn list_messages(
    db: &DatabaseConnection,
    user_id: i64,
    conversation: Option<i64>,
) -> Result<Vec<chat_message::Model>> {
    let ids: Vec<i64> = match conversation {
        Some(id) => vec![owned_conversation(db, user_id, id).await?.id],
        None => Conversation::find()
            .filter(conversation::Column::UserId.eq(user_id))
            .all(db)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect(),
    };
    ChatMessage::find()
        .filter(chat_message::Column::ConversationId.is_in(ids))
        .order_by_asc(chat_message::Column::Timestamp)
        .order_by_asc(chat_message::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

pub async fn get_message(db: &DatabaseConnection, user_id: i64, id: i64) -> Result<chat_message::Model> {
    let message = ChatMessage::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Message", id))?;
    owned_conversation(db, user_id, message.conversation_id)
        .await
        .map_err(|_| Error::not_found("Message", id))?;
    Ok(message)
}

/// One chat exchange inside a conversation.
pub async fn send_message(
    db: &DatabaseConnection,
    providers: &Providers,
    settings: &Settings,
    user_id: i64,
    conversation_id: i64,
    input: SendMessage,
) -> Result<ChatExchange> {
    let text = input.message.trim().to_string();
    if text.is_empty() {
        return Err(Error::validation("Message cannot be empty."));
    }
    let conversation = owned_conversation(db, user_id, conversation_id).await?;
    if !conversation.is_active {
        return Err(Error::invalid_state("This conversation is archived."));
    }

    let user_message = store_message(db, conversation_id, ChatRole::User, text.clone(), 0, 0).await?;

    let mut history = ChatMessage::find()
        .filter(chat_message::Column::ConversationId.eq(conversation_id))
        .order_by_desc(chat_message::Column::Timestamp)
        .order_by_desc(chat_message::Column::Id)
        .limit(HISTORY_LIMIT)
        .all(db)
        .await?;
    history.reverse();

    let language = detect_language(&text);
    let (reply, tokens_used, response_time_ms) =
        ask(providers.llm.as_ref(), context(history, language)).await.inspect_err(|e| {
            warn!("Chat provider failed for conversation {}: {}", conversation_id, e);
        })?;

    let ai_response = store_message(
        db,
        conversation_id,
        ChatRole::Assistant,
        reply,
        tokens_used,
        response_time_ms,
    )
    .await?;

    let message_count = ChatMessage::find()
        .filter(chat_message::Column::ConversationId.eq(conversation_id))
        .count(db)
        .await?;
    let needs_title = conversation.title.is_empty() && message_count == 2;
    let mut active: conversation::ActiveModel = conversation.into();
    if needs_title {
        active.title = Set(title_from(&text));
    }
    active.updated_at = Set(Utc::now());
    active.update(db).await?;

    let audio_url = if input.generate_audio {
        match voice::generate_audio(providers.text_to_speech.as_ref(), settings, &ai_response.content, language).await {
            Ok(audio) => Some(audio.audio_url),
            Err(e) => {
                warn!("Audio generation failed for message {}: {}", ai_response.id, e);
                None
            }
        }
    } else {
        None
    };

    info!(
        "Conversation {}: {} tokens in {} ms ({})",
        conversation_id, tokens_used, response_time_ms, language
    );
    Ok(ChatExchange {
        user_message,
        ai_response,
        tokens_used,
        response_time_ms,
        audio_url,
    })
}

/// A one-off question; nothing is stored.
pub async fn quick_chat(llm: &dyn LlmProvider, message: &str) -> Result<QuickReply> {
    let text = message.trim();
    if text.is_empty() {
        return Err(Error::validation("Message cannot be empty."));
    }
    let language = detect_language(text);
    let turns = vec![
        ChatTurn::new(ChatRole::System, SYSTEM_PROMPT),
        ChatTurn::new(ChatRole::System, language_instruction(language)),
        ChatTurn::new(ChatRole::User, text),
    ];
    let (response, tokens_used, response_time_ms) = ask(llm, turns).await?;
    Ok(QuickReply {
        response,
        language,
        tokens_used,
        response_time_ms,
    })
}

/// Rates a message in one of the caller's conversations. Rating again
/// replaces the earlier feedback.
pub async fn submit_feedback(
    db: &DatabaseConnection,
    user_id: i64,
    input: FeedbackInput,
) -> Result<chat_feedback::Model> {
    if !(1..=5).contains(&input.rating) {
        return Err(Error::validation("Rating must be between 1 and 5."));
    }
    let message = ChatMessage::find_by_id(input.message_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Message", input.message_id))?;
    owned_conversation(db, user_id, message.conversation_id)
        .await
        .map_err(|_| Error::not_found("Message", input.message_id))?;

    let existing = ChatFeedback::find()
        .filter(chat_feedback::Column::UserId.eq(user_id))
        .filter(chat_feedback::Column::MessageId.eq(message.id))
        .one(db)
        .await?;
    let comment = input.comment.trim().to_string();

    match existing {
        Some(feedback) => {
            let mut active: chat_feedback::ActiveModel = feedback.into();
            active.rating = Set(input.rating);
            active.comment = Set(comment);
            active.update(db).await.map_err(Into::into)
        }
        None => chat_feedback::ActiveModel {
            user_id: Set(user_id),
            message_id: Set(message.id),
            rating: Set(input.rating),
            comment: Set(comment),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(Into::into),
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = values.iter().sum::<i64>() as f64 / values.len() as f64;
    (avg * 100.0).round() / 100.0
}

pub async fn statistics(db: &DatabaseConnection, user_id: i64) -> Result<ChatStatistics> {
    let conversations = Conversation::find()
        .filter(conversation::Column::UserId.eq(user_id))
        .all(db)
        .await?;
    let ids: Vec<i64> = conversations.iter().map(|c| c.id).collect();
    let messages = ChatMessage::find()
        .filter(chat_message::Column::ConversationId.is_in(ids))
        .all(db)
        .await?;
    let feedback = ChatFeedback::find()
        .filter(chat_feedback::Column::UserId.eq(user_id))
        .all(db)
        .await?;

    let response_times: Vec<i64> = messages
        .iter()
        .filter(|m| m.role == ChatRole::Assistant)
        .map(|m| m.response_time_ms)
        .collect();
    let ratings: Vec<i64> = feedback.iter().map(|f| i64::from(f.rating)).collect();

    Ok(ChatStatistics {
        total_conversations: conversations.len() as u64,
        active_conversations: conversations.iter().filter(|c| c.is_active).count() as u64,
        total_messages: messages.len() as u64,
        total_tokens_used: messages.iter().map(|m| i64::from(m.tokens_used)).sum(),
        avg_response_time_ms: mean(&response_times),
        feedback_count: feedback.len() as u64,
        avg_rating: mean(&ratings),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("ನನ್ನ ಟೊಮೇಟೊ ಎಲೆಗಳಲ್ಲಿ ಹಳದಿ ಚುಕ್ಕೆಗಳಿವೆ"), "kn");
        assert_eq!(detect_language("My tomato leaves have yellow spots"), "en");
        // A tie stays English
        assert_eq!(detect_language("ab ಅಆ"), "en");
        assert_eq!(detect_language("12345"), "en");
        assert_eq!(language_instruction("kn"), KANNADA_INSTRUCTION);
    }

    #[test]
    fn test_title_is_truncated_by_characters() {
        let long = "ಅ".repeat(80);
        assert_eq!(title_from(&long).chars().count(), 50);
        assert_eq!(title_from("  short  "), "short");
    }

    #[tokio::test]
    async fn test_send_message_sets_title_and_context() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let llm = StubLlm::replying("Use neem oil 5 ml per litre.");
        let providers = stub_providers(llm.clone());
        let settings = test_settings();
        let conversation = create_conversation(&db, farmer.id, None).await?;

        let exchange = send_message(
            &db,
            &providers,
            &settings,
            farmer.id,
            conversation.id,
            SendMessage {
                message: "My tomato leaves have yellow spots, what should I spray this week?".to_string(),
                generate_audio: true,
            },
        )
        .await?;
        assert_eq!(exchange.ai_response.role, ChatRole::Assistant);
        assert_eq!(exchange.tokens_used, 42);
        assert!(exchange.audio_url.is_some());

        let detail = get_conversation(&db, farmer.id, conversation.id).await?;
        assert_eq!(detail.messages.len(), 2);
        assert_eq!(detail.conversation.title.chars().count(), 50);

        let sent = llm.last_request().unwrap();
        assert_eq!(sent.messages[0].content, SYSTEM_PROMPT);
        assert_eq!(sent.messages[1].content, ENGLISH_INSTRUCTION);
        assert_eq!(sent.messages.len(), 3);
        assert_eq!(sent.temperature, 0.7);
        assert_eq!(sent.max_tokens, 2000);
        Ok(())
    }

    #[tokio::test]
    async fn test_history_is_capped() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let llm = StubLlm::replying("ok");
        let providers = stub_providers(llm.clone());
        let settings = test_settings();
        let conversation = create_conversation(&db, farmer.id, Some("Paddy".to_string())).await?;

        for i in 0..10 {
            send_message(
                &db,
                &providers,
                &settings,
                farmer.id,
                conversation.id,
                SendMessage {
                    message: format!("question {i}"),
                    generate_audio: false,
                },
            )
            .await?;
        }
        let sent = llm.last_request().unwrap();
        assert_eq!(sent.messages.len(), 2 + 15);
        assert_eq!(sent.messages.last().unwrap().content, "question 9");

        // Explicit title is kept
        let detail = get_conversation(&db, farmer.id, conversation.id).await?;
        assert_eq!(detail.conversation.title, "Paddy");
        Ok(())
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_user_message() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let providers = unconfigured_providers();
        let settings = test_settings();
        let conversation = create_conversation(&db, farmer.id, None).await?;

        let result = send_message(
            &db,
            &providers,
            &settings,
            farmer.id,
            conversation.id,
            SendMessage {
                message: "ರಾಗಿ ಬೆಳೆಗೆ ಗೊಬ್ಬರ".to_string(),
                generate_audio: false,
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Provider(_))));

        let detail = get_conversation(&db, farmer.id, conversation.id).await?;
        assert_eq!(detail.messages.len(), 1);
        assert_eq!(detail.messages[0].role, ChatRole::User);
        assert!(detail.conversation.title.is_empty());

        assert!(matches!(
            send_message(
                &db,
                &providers,
                &settings,
                farmer.id,
                conversation.id,
                SendMessage {
                    message: "   ".to_string(),
                    generate_audio: false,
                },
            )
            .await,
            Err(Error::Validation { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_archive_feedback_and_statistics() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let other = create_test_farmer(&db, "suresh").await?;
        let providers = stub_providers(StubLlm::replying("ok"));
        let settings = test_settings();
        let conversation = create_conversation(&db, farmer.id, None).await?;
        let exchange = send_message(
            &db,
            &providers,
            &settings,
            farmer.id,
            conversation.id,
            SendMessage {
                message: "hello".to_string(),
                generate_audio: false,
            },
        )
        .await?;

        let feedback = FeedbackInput {
            message_id: exchange.ai_response.id,
            rating: 4,
            comment: String::new(),
        };
        assert!(matches!(
            submit_feedback(&db, other.id, feedback.clone()).await,
            Err(Error::NotFound { .. })
        ));
        submit_feedback(&db, farmer.id, feedback.clone()).await?;
        submit_feedback(&db, farmer.id, FeedbackInput { rating: 5, ..feedback }).await?;

        archive_conversation(&db, farmer.id, conversation.id).await?;
        assert!(list_conversations(&db, farmer.id).await?.is_empty());

        let stats = statistics(&db, farmer.id).await?;
        assert_eq!(stats.total_conversations, 1);
        assert_eq!(stats.active_conversations, 0);
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.total_tokens_used, 42);
        assert_eq!(stats.feedback_count, 1);
        assert_eq!(stats.avg_rating, 5.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_quick_chat_stores_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let reply = quick_chat(&StubLlm::replying("Sow after first rains."), "When to sow ragi?").await?;
        assert_eq!(reply.response, "Sow after first rains.");
        assert_eq!(reply.language, "en");
        assert_eq!(statistics(&db, farmer.id).await?.total_messages, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_recent_conversations_and_message_listing() -> Result<()> {
        let db = setup_test_db().await?;
        let farmer = create_test_farmer(&db, "ramesh").await?;
        let other = create_test_farmer(&db, "suresh").await?;
        let providers = stub_providers(StubLlm::replying("ok"));
        let settings = test_settings();

        let mut ids = Vec::new();
        for _ in 0..12 {
            ids.push(create_conversation(&db, farmer.id, None).await?.id);
        }
        archive_conversation(&db, farmer.id, ids[11]).await?;
        let recent = active_conversations(&db, farmer.id).await?;
        assert_eq!(recent.len(), 10);
        assert!(recent.iter().all(|c| c.is_active));

        for (conversation, text) in [(ids[0], "first"), (ids[1], "second")] {
            send_message(
                &db,
                &providers,
                &settings,
                farmer.id,
                conversation,
                SendMessage {
                    message: text.to_string(),
                    generate_audio: false,
                },
            )
            .await?;
        }

        assert_eq!(list_messages(&db, farmer.id, None).await?.len(), 4);
        let first = list_messages(&db, farmer.id, Some(ids[0])).await?;
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].content, "first");
        assert_eq!(get_message(&db, farmer.id, first[1].id).await?.role, ChatRole::Assistant);

        assert!(list_messages(&db, other.id, None).await?.is_empty());
        assert!(matches!(
            list_messages(&db, other.id, Some(ids[0])).await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            get_message(&db, other.id, first[0].id).await,
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }
}
