//! Story and help text generation
//!
//! Both flows are single-shot calls to an OpenAI-compatible chat completions
//! endpoint that is asked for a JSON object with one named field.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::command::TRIGGERS;
use crate::config::GeneratorConfig;
use crate::{Error, Result, Service};

/// Instruction sent when the user asks for a story
pub const STORY_REQUEST: &str = "tell a short story for a child in Russian";

/// Sentinel input of the help flow
pub const HELP_INPUT: &str = "help";

/// Free-form text generators used by the session
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a story for `request`
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceUnavailable`] if the generator fails
    async fn generate_story(&self, request: &str) -> Result<String>;

    /// Produce the spoken list of available commands
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceUnavailable`] if the generator fails
    async fn list_commands(&self, user_input: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StoryOutput {
    story: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HelpOutput {
    available_commands: String,
}

/// Generator backed by a chat completions endpoint
pub struct ChatGenerator {
    client: reqwest::Client,
    url: Url,
    model: String,
    api_key: Option<SecretString>,
}

impl ChatGenerator {
    /// Create a generator from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &GeneratorConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        tracing::debug!(url = %config.url, model = %config.model, "text generator initialized");

        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Run one chat completion and return the message content
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let mut builder = self.client.post(self.url.clone()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(error = %e, "generator request failed");
            Error::unavailable(Service::TextGeneration, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "generator error");
            return Err(Error::unavailable(
                Service::TextGeneration,
                format!("status {status}: {body}"),
            ));
        }

        let response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::unavailable(Service::TextGeneration, e))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::unavailable(Service::TextGeneration, "empty completion"))
    }
}

/// Pull the named field out of a structured reply
///
/// Models occasionally ignore the JSON instruction; plain text is then used
/// as is.
fn structured_field<T, F>(content: &str, field: F) -> String
where
    T: DeserializeOwned,
    F: FnOnce(T) -> String,
{
    match serde_json::from_str::<T>(content) {
        Ok(parsed) => field(parsed),
        Err(e) => {
            tracing::debug!(error = %e, "generator reply is not structured, using raw text");
            content.trim().to_string()
        }
    }
}

fn story_prompt() -> &'static str {
    "You are a storyteller for young children. Write a short, kind story in \
     Russian made of short sentences that read well aloud. Respond with a JSON \
     object of the form {\"story\": \"...\"}."
}

fn help_prompt() -> String {
    let commands: Vec<String> = TRIGGERS
        .iter()
        .map(|(trigger, _)| format!("\"{trigger}\""))
        .collect();

    format!(
        "You are a voice assistant. The user has asked for help. You should \
         respond with a list of available commands that the user can say.\n\n\
         The available commands are: {}.\n\
         Return the list of available commands in the availableCommands field \
         of a JSON object.\n\
         Example: Я понимаю: привет, сказка, игры, помощь, пока.",
        commands.join(", ")
    )
}

#[async_trait]
impl TextGenerator for ChatGenerator {
    async fn generate_story(&self, request: &str) -> Result<String> {
        tracing::info!(request, "generating story");
        let content = self.complete(story_prompt(), request).await?;
        let story = structured_field(&content, |out: StoryOutput| out.story);
        tracing::debug!(chars = story.chars().count(), "story generated");
        Ok(story)
    }

    async fn list_commands(&self, user_input: &str) -> Result<String> {
        tracing::info!(user_input, "generating help");
        let content = self.complete(&help_prompt(), user_input).await?;
        Ok(structured_field(&content, |out: HelpOutput| {
            out.available_commands
        }))
    }
}
