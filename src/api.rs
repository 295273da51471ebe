// API module: the boundary to the remote Rainbird reasoning service.
// The engine itself (sessions, certainty factors, knowledge-map traversal)
// lives on the server; this side only speaks {create-session, query,
// respond} through the `ReasoningService` and `Session` traits so the
// decision loop can run against a stub in tests.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::DecisionError;

/// Certainty attached to every answer this client submits.
pub const MAX_CERTAINTY: &str = "100";

/// Treat a JSON `null` the same as a missing field.
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Render a loosely typed JSON value the way it should appear on screen:
/// strings without quotes, everything else in its JSON form.
pub fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A candidate value offered by the engine for a question's object.
/// `value` stays a `serde_json::Value` because the engine may send
/// numbers, dates or booleans; only strings can be submitted back.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_type: Option<String>,
}

impl Concept {
    /// A text-valued concept with the same name and value.
    pub fn text(value: &str) -> Self {
        Concept {
            name: value.to_string(),
            value: serde_json::Value::String(value.to_string()),
            concept_type: None,
        }
    }

    /// The value when it is text-typed.
    pub fn as_text(&self) -> Option<&str> {
        self.value.as_str()
    }
}

/// A question generated by the engine.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default, deserialize_with = "nullable")]
    pub subject: String,
    #[serde(default, deserialize_with = "nullable")]
    pub relationship: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub prompt: String,
    #[serde(default, deserialize_with = "nullable")]
    pub concepts: Vec<Concept>,
    /// Whether a free-text answer is allowed besides the listed concepts.
    #[serde(default)]
    pub can_add: bool,
    #[serde(default, rename = "allowCF")]
    pub allow_cf: bool,
    #[serde(default)]
    pub allow_unknown: bool,
    #[serde(default)]
    pub plural: bool,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

/// An answer submitted back to the engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QAnswer {
    pub subject: String,
    pub relationship: String,
    pub object: String,
    pub cf: String,
}

impl QAnswer {
    /// Answer `question` with `object` at maximum certainty.
    pub fn certain(question: &Question, object: impl Into<String>) -> Self {
        QAnswer {
            subject: question.subject.clone(),
            relationship: question.relationship.clone(),
            object: object.into(),
            cf: MAX_CERTAINTY.to_string(),
        }
    }
}

/// One tuple of the engine's final conclusion. `certainty` arrives as a
/// number from the live service and as a string from older deployments.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "RawAnswer")]
pub struct Answer {
    pub subject: String,
    #[serde(rename = "relationshipType")]
    pub relationship: String,
    pub object: String,
    pub certainty: serde_json::Value,
}

/// Result row as sent on the wire. Rows may name the relationship as
/// `relationshipType`, `relationship` or both, and the certainty as
/// `certainty`, `cf` or both; the first spelling wins.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnswer {
    #[serde(default, deserialize_with = "nullable")]
    subject: String,
    #[serde(default)]
    relationship_type: Option<String>,
    #[serde(default)]
    relationship: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    object: String,
    #[serde(default)]
    certainty: Option<serde_json::Value>,
    #[serde(default)]
    cf: Option<serde_json::Value>,
}

impl From<RawAnswer> for Answer {
    fn from(raw: RawAnswer) -> Self {
        Answer {
            subject: raw.subject,
            relationship: raw.relationship_type.or(raw.relationship).unwrap_or_default(),
            object: raw.object,
            certainty: raw.certainty.or(raw.cf).unwrap_or_default(),
        }
    }
}

/// What the engine sends back from both query and response calls:
/// either a pending question or a non-empty result.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EngineReply {
    #[serde(default)]
    pub question: Option<Question>,
    #[serde(default, deserialize_with = "nullable")]
    pub result: Vec<Answer>,
}

impl EngineReply {
    pub fn is_final(&self) -> bool {
        !self.result.is_empty()
    }
}

#[derive(Serialize, Debug)]
struct QueryRequest<'a> {
    subject: &'a str,
    relationship: &'a str,
    object: &'a str,
}

#[derive(Serialize, Debug)]
struct ResponseRequest<'a> {
    answers: &'a [QAnswer],
}

#[derive(Deserialize, Debug)]
struct StartResponse {
    #[serde(default)]
    id: Option<String>,
}

/// One stateful remote conversation over a knowledge map.
pub trait Session {
    fn id(&self) -> &str;

    /// Start reasoning on a subject/relationship/object triple.
    fn query(&mut self, subject: &str, relationship: &str, object: &str) -> Result<EngineReply>;

    /// Submit answers to the pending question.
    fn respond(&mut self, answers: &[QAnswer]) -> Result<EngineReply>;
}

/// Something that can open sessions against a knowledge map.
pub trait ReasoningService {
    type Session: Session;

    fn create_session(&self, km_id: &str, token: &str) -> Result<Self::Session>;
}

/// Blocking HTTP client for the Rainbird API. Holds the reqwest client,
/// the environment base URL and the API key used for basic auth.
#[derive(Clone, Debug)]
pub struct RainbirdClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RainbirdClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.base_url(), &config.api_key, config.timeout_secs)
    }

    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(RainbirdClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    #[cfg(test)]
    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The API key is the basic-auth user name; the password stays empty.
    fn auth(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.api_key, Some(""))
    }

    fn handle_response<T: DeserializeOwned>(res: Response) -> Result<T> {
        let status = res.status();
        if !status.is_success() {
            let body = res.text().unwrap_or_default();
            return Err(DecisionError::Service {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        res.json().context("Parsing Rainbird response json")
    }
}

impl ReasoningService for RainbirdClient {
    type Session = RainbirdSession;

    fn create_session(&self, km_id: &str, token: &str) -> Result<RainbirdSession> {
        let url = format!("{}/start/{}", self.base_url, km_id);
        debug!(%url, "starting session");
        let res = self
            .auth(self.client.get(&url))
            .query(&[("contextId", token)])
            .send()
            .context("Failed to send start request")?;
        let start: StartResponse = Self::handle_response(res)?;
        let id = start
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| token.to_string());
        Ok(RainbirdSession {
            client: self.clone(),
            id,
        })
    }
}

/// A live session on the Rainbird service.
#[derive(Clone, Debug)]
pub struct RainbirdSession {
    client: RainbirdClient,
    id: String,
}

impl RainbirdSession {
    fn post<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<EngineReply> {
        let url = format!("{}/{}/{}", self.client.base_url, self.id, endpoint);
        debug!(%url, "posting to engine");
        let res = self
            .client
            .auth(self.client.client.post(&url))
            .json(body)
            .send()
            .with_context(|| format!("Failed to send {} request", endpoint))?;
        RainbirdClient::handle_response(res)
    }
}

impl Session for RainbirdSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn query(&mut self, subject: &str, relationship: &str, object: &str) -> Result<EngineReply> {
        self.post(
            "query",
            &QueryRequest {
                subject,
                relationship,
                object,
            },
        )
    }

    fn respond(&mut self, answers: &[QAnswer]) -> Result<EngineReply> {
        self.post("response", &ResponseRequest { answers })
    }
}
