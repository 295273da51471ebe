// Decision flow: open a session for the configured knowledge map, then
// run the query/response loop until the engine reaches a conclusion.

use anyhow::{Context, Result};
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::{Answer, ReasoningService, Session};
use crate::config::Config;
use crate::error::DecisionError;
use crate::ui::Asker;

/// Open a session on `config.km_id` under a fresh UUID v4 token.
pub fn start_session<S: ReasoningService>(service: &S, config: &Config) -> Result<S::Session> {
    let token = Uuid::new_v4().to_string();
    let session = service
        .create_session(&config.km_id, &token)
        .with_context(|| format!("Failed to start session on knowledge map {}", config.km_id))?;
    info!(km_id = %config.km_id, session = %session.id(), "session started");
    Ok(session)
}

/// Complete a single decision tree.
///
/// Queries `subject relationship object`, then answers one question per
/// round until the engine returns a non-empty result, which is returned.
/// Every round submits exactly one answer; nothing is sent after the
/// result arrives. Any service or asker error ends the loop.
pub fn make_decision<S, A>(
    session: &mut S,
    asker: &mut A,
    subject: &str,
    relationship: &str,
    object: &str,
) -> Result<Vec<Answer>>
where
    S: Session + ?Sized,
    A: Asker + ?Sized,
{
    info!(subject, relationship, object, "querying engine");
    let mut reply = session.query(subject, relationship, object)?;
    let mut rounds = 0usize;

    while !reply.is_final() {
        let question = reply.question.as_ref().ok_or(DecisionError::EmptyQuestion)?;
        debug!(prompt = %question.prompt, concepts = question.concepts.len(), "engine asked");

        let answer = asker.ask(question)?;
        debug!(object = %answer.object, "submitting answer");
        reply = session.respond(std::slice::from_ref(&answer))?;
        rounds += 1;
    }

    info!(rounds, answers = reply.result.len(), "engine reached a conclusion");
    Ok(reply.result)
}
