//! Chat Orchestrator (C10): `POST /<instance>/chat` and cross-instance
//! `POST /chat`, a tool-calling loop over the chat provider streamed back
//! to the client as SSE (§4.10).

use crate::chat_provider::{ContentBlock, Message, ProviderEvent, Role, ToolSpec};
use crate::pages::generate_page;
use crate::state::AppState;
use crate::tools::registry;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use tokio::sync::mpsc;

const MAX_ITERATIONS: usize = 10;
const PREVIEW_LEN: usize = 200;
const GENERATE_PAGE_TOOL: &str = "generate_page";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone)]
enum ChatEvent {
    Session { session_id: String },
    Text { text: String },
    ToolCall { id: String, name: String },
    ToolResult { id: String, name: String, result_preview: String },
    PageCreated { url: String, title: String },
    Error { error: String },
    Done {},
}

fn to_sse(event: ChatEvent) -> Event {
    let (name, payload) = match &event {
        ChatEvent::Session { session_id } => ("session", json!({"session_id": session_id})),
        ChatEvent::Text { text } => ("text", json!({"text": text})),
        ChatEvent::ToolCall { id, name } => ("tool_call", json!({"id": id, "name": name})),
        ChatEvent::ToolResult { id, name, result_preview } => ("tool_result", json!({"id": id, "name": name, "result_preview": result_preview})),
        ChatEvent::PageCreated { url, title } => ("page_created", json!({"url": url, "title": title})),
        ChatEvent::Error { error } => ("error", json!({"error": error})),
        ChatEvent::Done {} => ("done", json!({})),
    };
    Event::default().event(name).data(payload.to_string())
}

/// Single-instance chat: `POST /<instance>/chat`.
pub async fn chat_instance(
    State(state): State<AppState>,
    Path(instance): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    chat_stream(state, Some(instance), request)
}

/// Cross-instance chat: `POST /chat`. Every instance's tools are exposed
/// prefixed `<instance>__<tool>`; routing strips the prefix at dispatch.
pub async fn chat_cross_instance(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    chat_stream(state, None, request)
}

/// `DELETE /{instance}/chat/{session_id}` — explicit session teardown.
pub async fn delete_session(State(state): State<AppState>, Path((_instance, session_id)): Path<(String, String)>) -> impl IntoResponse {
    let removed = state.sessions.remove(&session_id);
    Json(json!({"status": if removed { "removed" } else { "not_found" }}))
}

fn chat_stream(state: AppState, instance: Option<String>, request: ChatRequest) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::channel::<ChatEvent>(100);

    tokio::spawn(async move {
        if let Err(e) = process_chat(state, instance, request, tx.clone()).await {
            let _ = tx.send(ChatEvent::Error { error: e }).await;
        }
        let _ = tx.send(ChatEvent::Done {}).await;
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok(to_sse(event));
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn process_chat(
    state: AppState,
    instance: Option<String>,
    request: ChatRequest,
    tx: mpsc::Sender<ChatEvent>,
) -> Result<(), String> {
    let cross_instance = instance.is_none();
    let session_instance = instance.clone().unwrap_or_else(|| "_cross".to_string());

    let session_id = match &request.session_id {
        Some(id) if state.sessions.touch(id) => id.clone(),
        _ => {
            let id = state.sessions.create(&session_instance);
            id
        }
    };
    tx.send(ChatEvent::Session { session_id: session_id.clone() }).await.ok();
    if let Some(instance) = &instance {
        state.audit.chat(instance, &session_id);
    } else {
        state.audit.chat("_cross", &session_id);
    }

    state.sessions.with_messages(&session_id, |messages| {
        messages.push(Message::user_text(&request.message));
    });

    let tool_specs = build_tool_specs(&state, instance.as_deref(), cross_instance);
    let system = "You are a personal digital-memory assistant. Use the available tools to answer questions \
                  about the user's captured screen history. Call what-can-i-do if unsure what is available."
        .to_string();

    for _ in 0..MAX_ITERATIONS {
        let messages = state.sessions.with_messages(&session_id, |m| m.clone()).ok_or("session_expired")?;
        let mut stream = state.chat_provider.stream(&system, &messages, &tool_specs).await.map_err(|e| e.to_string())?;

        let mut text = String::new();
        let mut tool_uses: Vec<(String, String, serde_json::Value)> = Vec::new();
        while let Some(event) = stream.next().await {
            match event {
                ProviderEvent::TextDelta(delta) => {
                    text.push_str(&delta);
                    tx.send(ChatEvent::Text { text: delta }).await.ok();
                }
                ProviderEvent::ToolUse { id, name, input } => {
                    tx.send(ChatEvent::ToolCall { id: id.clone(), name: name.clone() }).await.ok();
                    tool_uses.push((id, name, input));
                }
                ProviderEvent::Done => break,
            }
        }

        let mut assistant_blocks = Vec::new();
        if !text.is_empty() {
            assistant_blocks.push(ContentBlock::Text { text: text.clone() });
        }
        for (id, name, input) in &tool_uses {
            assistant_blocks.push(ContentBlock::ToolUse { id: id.clone(), name: name.clone(), input: input.clone() });
        }
        state.sessions.with_messages(&session_id, |m| m.push(Message { role: Role::Assistant, content: assistant_blocks }));

        if tool_uses.is_empty() {
            return Ok(());
        }

        let mut result_blocks = Vec::new();
        for (id, name, input) in tool_uses {
            let (result_text, is_error) = dispatch_tool(&state, instance.as_deref(), cross_instance, &name, input.clone()).await;
            let preview: String = result_text.chars().take(PREVIEW_LEN).collect();
            tx.send(ChatEvent::ToolResult { id: id.clone(), name: name.clone(), result_preview: preview }).await.ok();

            if name == GENERATE_PAGE_TOOL && !is_error {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(&result_text) {
                    if let (Some(url), Some(title)) = (value.get("url").and_then(|v| v.as_str()), value.get("title").and_then(|v| v.as_str())) {
                        tx.send(ChatEvent::PageCreated { url: url.to_string(), title: title.to_string() }).await.ok();
                    }
                }
            }

            result_blocks.push(ContentBlock::ToolResult { tool_use_id: id, content: result_text, is_error });
        }
        state.sessions.with_messages(&session_id, |m| m.push(Message { role: Role::User, content: result_blocks }));
    }

    Ok(())
}

fn build_tool_specs(state: &AppState, instance: Option<&str>, cross_instance: bool) -> Vec<ToolSpec> {
    let mut specs = Vec::new();
    let instances: Vec<&str> = if cross_instance {
        state.instances.keys().map(|s| s.as_str()).collect()
    } else {
        instance.into_iter().collect()
    };
    for inst_name in &instances {
        for tool in registry() {
            let name = if cross_instance { format!("{inst_name}__{}", tool.name()) } else { tool.name().to_string() };
            specs.push(ToolSpec { name, description: tool.description().to_string(), input_schema: tool.input_schema() });
        }
    }
    specs.push(ToolSpec {
        name: GENERATE_PAGE_TOOL.to_string(),
        description: "Render a Markdown document as a standalone HTML page and return its URL.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {"title": {"type": "string"}, "markdown": {"type": "string"}},
            "required": ["title", "markdown"],
        }),
    });
    specs
}

async fn dispatch_tool(state: &AppState, instance: Option<&str>, cross_instance: bool, name: &str, arguments: serde_json::Value) -> (String, bool) {
    if name == GENERATE_PAGE_TOOL {
        return dispatch_generate_page(state, instance, arguments);
    }

    let (target_instance, tool_name) = if cross_instance {
        match name.split_once("__") {
            Some((inst, tool)) => (inst.to_string(), tool.to_string()),
            None => return (json!({"error": "cross-instance tool calls must be prefixed"}).to_string(), true),
        }
    } else {
        (instance.unwrap_or_default().to_string(), name.to_string())
    };

    let Some(inst) = state.instance(&target_instance) else {
        return (json!({"error": "unknown_instance"}).to_string(), true);
    };
    let tools = registry();
    let Some(tool) = tools.iter().find(|t| t.name() == tool_name) else {
        return (json!({"error": "unknown_tool"}).to_string(), true);
    };

    let (allow, reason) = state.validator.validate(&tool_name, &arguments, &target_instance).await;
    if !allow {
        state.audit.ai_deny(&target_instance, &tool_name, &reason);
        return (json!({"error": "policy_denied", "reason": reason}).to_string(), true);
    }

    match tool.call(&inst, arguments).await {
        Ok(value) => (value.to_string(), false),
        Err(e) => (json!({"error": e.message}).to_string(), true),
    }
}

/// `generate_page` resolves its output directory from the instance supplied
/// at call time: the arguments' own `instance` field wins over the chat
/// session's instance, which in turn wins over the server's default pages
/// directory for a cross-instance session with no instance named (§9 open
/// question — "instance name supplied at call time wins").
fn dispatch_generate_page(state: &AppState, instance: Option<&str>, arguments: serde_json::Value) -> (String, bool) {
    let title = arguments.get("title").and_then(|v| v.as_str()).unwrap_or("Untitled");
    let markdown = arguments.get("markdown").and_then(|v| v.as_str()).unwrap_or("");
    let named_instance = arguments.get("instance").and_then(|v| v.as_str()).or(instance);

    let pages_dir = match named_instance.and_then(|name| state.instance(name)) {
        Some(inst) => inst.pages_dir.clone(),
        None => state.config.pages_dir.clone(),
    };
    match generate_page(&pages_dir, title, markdown) {
        Ok(slug) => (json!({"url": format!("/pages/{slug}"), "title": title}).to_string(), false),
        Err(e) => (json!({"error": e.to_string()}).to_string(), true),
    }
}
