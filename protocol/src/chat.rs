//! # Assistant Chat
//!
//! The dashboard's help assistant. [`OpenAiChat`] forwards the conversation
//! to an OpenAI-compatible chat-completions endpoint; [`FallbackChat`]
//! answers with a canned reply when no API key is configured.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
const MAX_TOKENS: u32 = 500;
const TEMPERATURE: f32 = 0.7;

/// Reply used when the provider returns no choices.
pub const EMPTY_REPLY: &str = "Sorry, I couldn't generate a response.";

pub const SYSTEM_PROMPT: &str = "\
You are Peri, the official AI agent of Peridot Protocol, a next-generation cross-chain DeFi platform. \
Your job is to help users understand, use, and benefit from all features of Peridot Protocol. \
You are friendly, concise, and always focused on user empowerment and safety.

Peridot Protocol enables users to:
- Lend and borrow crypto assets across multiple blockchains (cross-chain DeFi)
- Earn attractive yields by supplying assets to decentralized vaults
- Borrow against their crypto holdings with flexible collateral options
- Short assets and profit from market downturns using Peridot's unique shorting mechanism
- Manage risk with advanced tools like stop-loss, take-profit, and portfolio rebalancing
- Enjoy low fees, fast transactions, and a seamless user experience
- Access DeFi without needing to be an expert: Peridot is designed for everyone, from beginners to pros

Key advantages of Peridot Protocol:
- True cross-chain lending and borrowing: supply on one chain, borrow on another
- Simple onboarding: connect your wallet and start earning or borrowing in minutes
- Transparent, non-custodial, and secure: your assets remain in your control
- Powerful analytics and AI-driven insights to help users make smarter decisions
- Community-driven: users can participate in governance and shape the future of Peridot

How to use Peridot:
- To lend: connect your wallet, select an asset, and deposit it into a vault to start earning
- To borrow: supply collateral, choose the asset you want to borrow, and confirm the transaction
- To short: use the shorting feature to profit from falling prices (explain simply if asked)
- For help: ask Peri (the AI) about any feature, strategy, or DeFi concept

Always explain things in a way that is enticing and easy to understand for laymen. \
Highlight the benefits of using Peridot for lending, borrowing, and cross-chain DeFi. \
If a user asks about risks, be honest and recommend best practices for safety.

Keep responses helpful, concise, and focused on DeFi/crypto topics. \
Always prioritize user safety and suggest proper risk management.";

const FALLBACK_REPLIES: [&str; 4] = [
    "I'm here to help with DeFi strategies and portfolio management. However, AI chat is currently unavailable.",
    "Thanks for your question about Peridot Protocol! Please check our documentation for detailed information.",
    "I'd love to help with your DeFi questions, but AI chat functionality requires additional setup.",
    "For assistance with cross-chain transactions and portfolio management, please refer to our help section.",
];

/// A prior turn as the dashboard stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub message: String,
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Produces one assistant reply for a conversation.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String>;

    fn name(&self) -> &'static str;
}

/// System prompt, then history, then the latest message. Any role other
/// than `user` is sent as `assistant`.
pub fn build_messages(request: &ChatRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(ChatMessage {
        role: "system".into(),
        content: SYSTEM_PROMPT.into(),
    });
    messages.extend(request.history.iter().map(|turn| ChatMessage {
        role: if turn.role == "user" { "user" } else { "assistant" }.into(),
        content: turn.message.clone(),
    }));
    messages.push(ChatMessage {
        role: "user".into(),
        content: request.message.clone().unwrap_or_default(),
    });
    messages
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<ChatMessage>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChat {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.into(),
            model: DEFAULT_CHAT_MODEL.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl std::fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let body = CompletionRequest {
            model: &self.model,
            messages: build_messages(request),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Chat(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %text, "chat completion failed");
            return Err(GatewayError::Chat(format!("provider returned HTTP {}", status)));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Chat(e.to_string()))?;
        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .map(|m| m.content)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| EMPTY_REPLY.to_string()))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// Canned replies for deployments without a chat provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackChat;

#[async_trait]
impl ChatProvider for FallbackChat {
    async fn complete(&self, _request: &ChatRequest) -> Result<String> {
        let reply = FALLBACK_REPLIES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(FALLBACK_REPLIES[0]);
        Ok(reply.to_string())
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}
