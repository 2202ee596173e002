//! `/api/chatbot/` - Conversations with the farming assistant plus voice
//! input and output.

use crate::{
    api::{
        AppState,
        extract::{AuthUser, Json, Path, Query, Upload},
        response::ApiResponse,
    },
    core::{
        chat::{self, ChatExchange, ChatStatistics, ConversationDetail, FeedbackInput, QuickReply, SendMessage},
        voice::{self, GeneratedAudio, Transcription},
    },
    entities::{chat_feedback, chat_message, conversation},
    errors::Result,
    providers::AudioClip,
};
use axum::{
    Router,
    extract::{Multipart, State},
    routing::{delete, get, post},
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct NewConversation {
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageFilter {
    pub conversation: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct QuickChatRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioRequest {
    pub text: String,
    #[serde(default)]
    pub language: String,
}

async fn list_conversations(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<ApiResponse<Vec<conversation::Model>>> {
    Ok(ApiResponse::success(chat::list_conversations(&state.db, caller.id()).await?))
}

async fn create_conversation(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(request): Json<NewConversation>,
) -> Result<ApiResponse<conversation::Model>> {
    let created = chat::create_conversation(&state.db, caller.id(), request.title).await?;
    Ok(ApiResponse::created("Conversation started", created))
}

async fn active_conversations(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<ApiResponse<Vec<conversation::Model>>> {
    Ok(ApiResponse::success(chat::active_conversations(&state.db, caller.id()).await?))
}

async fn get_conversation(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<ConversationDetail>> {
    Ok(ApiResponse::success(chat::get_conversation(&state.db, caller.id(), id).await?))
}

async fn archive_conversation(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<conversation::Model>> {
    let archived = chat::archive_conversation(&state.db, caller.id(), id).await?;
    Ok(ApiResponse::with_message("Conversation archived", archived))
}

async fn send_message(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
    Json(input): Json<SendMessage>,
) -> Result<ApiResponse<ChatExchange>> {
    let exchange = chat::send_message(&state.db, &state.providers, &state.settings, caller.id(), id, input).await?;
    Ok(ApiResponse::success(exchange))
}

async fn list_messages(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(filter): Query<MessageFilter>,
) -> Result<ApiResponse<Vec<chat_message::Model>>> {
    Ok(ApiResponse::success(
        chat::list_messages(&state.db, caller.id(), filter.conversation).await?,
    ))
}

async fn get_message(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<i64>,
) -> Result<ApiResponse<chat_message::Model>> {
    Ok(ApiResponse::success(chat::get_message(&state.db, caller.id(), id).await?))
}

async fn quick_chat(
    State(state): State<AppState>,
    _caller: AuthUser,
    Json(request): Json<QuickChatRequest>,
) -> Result<ApiResponse<QuickReply>> {
    Ok(ApiResponse::success(
        chat::quick_chat(state.providers.llm.as_ref(), &request.message).await?,
    ))
}

async fn transcribe(
    State(state): State<AppState>,
    _caller: AuthUser,
    multipart: Multipart,
) -> Result<ApiResponse<Transcription>> {
    let upload = Upload::read(multipart, "audio").await?;
    let language = upload.field("language").map(str::to_string);
    let clip = AudioClip {
        file_name: if upload.file_name.is_empty() {
            "recording.webm".to_string()
        } else {
            upload.file_name
        },
        content_type: upload.content_type,
        bytes: upload.bytes,
    };
    let result = voice::transcribe(state.providers.speech_to_text.as_ref(), clip, language.as_deref()).await?;
    Ok(ApiResponse::success(result))
}

async fn generate_audio(
    State(state): State<AppState>,
    _caller: AuthUser,
    Json(request): Json<AudioRequest>,
) -> Result<ApiResponse<GeneratedAudio>> {
    let audio = voice::generate_audio(
        state.providers.text_to_speech.as_ref(),
        &state.settings,
        &request.text,
        &request.language,
    )
    .await?;
    Ok(ApiResponse::success(audio))
}

async fn feedback(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(input): Json<FeedbackInput>,
) -> Result<ApiResponse<chat_feedback::Model>> {
    let saved = chat::submit_feedback(&state.db, caller.id(), input).await?;
    Ok(ApiResponse::with_message("Thank you for your feedback", saved))
}

async fn statistics(State(state): State<AppState>, caller: AuthUser) -> Result<ApiResponse<ChatStatistics>> {
    Ok(ApiResponse::success(chat::statistics(&state.db, caller.id()).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations/", get(list_conversations).post(create_conversation))
        .route("/conversations/active_conversations/", get(active_conversations))
        .route("/conversations/{id}/", get(get_conversation))
        .route("/conversations/{id}/archive/", delete(archive_conversation))
        .route("/conversations/{id}/send_message/", post(send_message))
        .route("/conversations/{id}/send-message/", post(send_message))
        .route("/messages/", get(list_messages))
        .route("/messages/{id}/", get(get_message))
        .route("/quick-chat/", post(quick_chat))
        .route("/transcribe/", post(transcribe))
        .route("/generate-audio/", post(generate_audio))
        .route("/feedback/", post(feedback))
        .route("/statistics/", get(statistics))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use crate::api::routes::testing::{TestApp, multipart};
    use crate::test_utils::{StubLlm, create_test_farmer, stub_providers, unconfigured_providers};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_conversation_round_trip() {
        let app = TestApp::new(stub_providers(StubLlm::replying("Apply neem cake."))).await;
        create_test_farmer(&app.db, "ramesh").await.unwrap();
        let token = app.token("ramesh").await;

        let (status, body) = app
            .call(Method::POST, "/api/chatbot/conversations/", Some(&token), Some(json!({})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = app
            .call(
                Method::POST,
                &format!("/api/chatbot/conversations/{id}/send_message/"),
                Some(&token),
                Some(json!({"message": "How do I control root grubs in areca?"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["ai_response"]["content"], "Apply neem cake.");
        assert_eq!(body["data"]["tokens_used"], 42);

        let (_, detail) = app
            .call(Method::GET, &format!("/api/chatbot/conversations/{id}/"), Some(&token), None)
            .await;
        assert_eq!(detail["data"]["messages"].as_array().unwrap().len(), 2);
        assert!(detail["data"]["title"].as_str().unwrap().starts_with("How do I control"));

        let (status, _) = app
            .call(Method::DELETE, &format!("/api/chatbot/conversations/{id}/archive/"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let (_, listed) = app.call(Method::GET, "/api/chatbot/conversations/", Some(&token), None).await;
        assert!(listed["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_message_listing_and_action_aliases() {
        let app = TestApp::new(stub_providers(StubLlm::replying("Use drip lines."))).await;
        create_test_farmer(&app.db, "ramesh").await.unwrap();
        create_test_farmer(&app.db, "suresh").await.unwrap();
        let token = app.token("ramesh").await;
        let other = app.token("suresh").await;

        let (_, body) = app
            .call(Method::POST, "/api/chatbot/conversations/", Some(&token), Some(json!({"title": "Water"})))
            .await;
        let id = body["data"]["id"].as_i64().unwrap();
        let (status, _) = app
            .call(
                Method::POST,
                &format!("/api/chatbot/conversations/{id}/send-message/"),
                Some(&token),
                Some(json!({"message": "How often to water chilli?"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, recent) = app
            .call(Method::GET, "/api/chatbot/conversations/active_conversations/", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(recent["data"][0]["id"], id);

        let (_, messages) = app
            .call(Method::GET, &format!("/api/chatbot/messages/?conversation={id}"), Some(&token), None)
            .await;
        let messages = messages["data"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        let reply = messages[1]["id"].as_i64().unwrap();

        let (status, body) = app
            .call(Method::GET, &format!("/api/chatbot/messages/{reply}/"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["content"], "Use drip lines.");

        let (status, _) = app
            .call(Method::GET, &format!("/api/chatbot/messages/{reply}/"), Some(&other), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_provider_failure_is_bad_gateway() {
        let app = TestApp::new(unconfigured_providers()).await;
        create_test_farmer(&app.db, "ramesh").await.unwrap();
        let token = app.token("ramesh").await;

        let (status, body) = app
            .call(Method::POST, "/api/chatbot/quick-chat/", Some(&token), Some(json!({"message": "Hello"})))
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_transcribe_multipart() {
        let app = TestApp::new(stub_providers(StubLlm::replying("ok"))).await;
        create_test_farmer(&app.db, "ramesh").await.unwrap();
        let token = app.token("ramesh").await;

        let request = multipart(
            "/api/chatbot/transcribe/",
            &token,
            &[
                ("audio", Some("voice.webm"), "audio/webm", &b"fake-audio"[..]),
                ("language", None, "text/plain", &b"auto"[..]),
            ],
        );
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["text"], "transcribed (auto)");
        assert_eq!(body["data"]["language"], "auto");
    }
}
