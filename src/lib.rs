// Library root
// -----------
// Interactive client for a remote Rainbird reasoning session. The binary
// (`main.rs`) wires these modules together.
//
// Module responsibilities:
// - `api`: wire types and the {create-session, query, respond} boundary,
//   with the blocking HTTP implementation.
// - `config`: API key, environment and knowledge map, resolved once.
// - `decision`: session start and the question/answer loop.
// - `ui`: the two ways of asking a human, plus question/answer rendering.
// - `error`: domain errors callers match on.
pub mod api;
pub mod config;
pub mod decision;
pub mod error;
pub mod ui;

pub use api::{Answer, QAnswer, Question, RainbirdClient, ReasoningService, Session};
pub use config::Config;
pub use decision::{make_decision, start_session};
pub use error::DecisionError;
