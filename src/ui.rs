// UI layer: turns engine questions into prompts and human input into
// answers. Two interchangeable `Asker`s exist: `ManualAsker` prints a
// numbered menu and reads an index from a line-based reader, and
// `SelectAsker` hands the choice to a `dialoguer` fuzzy-select widget.

use std::io::{self, BufRead, Stdin, Stdout, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{FuzzySelect, Input};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::api::{display_value, Answer, EngineReply, QAnswer, Question, Session};
use crate::error::DecisionError;

/// Menu label for the free-text entry.
pub const OTHER_LABEL: &str = "Other";

/// How the human is asked each question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    /// Numbered menu, answer by typing an index.
    #[default]
    Manual,
    /// Searchable selection widget.
    Select,
}

/// The "ask" capability: given a question, produce exactly one answer.
pub trait Asker {
    fn ask(&mut self, question: &Question) -> Result<QAnswer>;
}

/// Read one line, without its line terminator. End of input is an error.
fn read_line<R: BufRead>(input: &mut R) -> Result<String> {
    let mut line = String::new();
    let n = input.read_line(&mut line).context("Failed to read from input")?;
    if n == 0 {
        return Err(DecisionError::InputClosed.into());
    }
    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(line)
}

/// Read an integer in `[lower, upper]`, re-prompting on anything else.
/// Each rejection writes the reason to `out` before reading again.
pub fn read_integer<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    lower: i64,
    upper: i64,
) -> Result<i64> {
    loop {
        let line = read_line(input)?;
        match line.trim().parse::<i64>() {
            Ok(i) if (lower..=upper).contains(&i) => return Ok(i),
            Ok(_) => writeln!(out, "integer not between {} and {}", lower, upper)?,
            Err(_) => writeln!(out, "expected an integer, got {:?}", line.trim())?,
        }
        debug!(%line, "rejected menu input");
    }
}

/// The prompt followed by one `\t{index}\t{value}` line per concept, plus
/// an `Other` line at index `concepts.len()` when free text is allowed.
pub fn render_question(question: &Question) -> String {
    let mut out = question.prompt.clone();
    for (i, concept) in question.concepts.iter().enumerate() {
        out.push_str(&format!("\n\t{}\t{}", i, display_value(&concept.value)));
    }
    if question.can_add {
        out.push_str(&format!("\n\t{}\t{}", question.concepts.len(), OTHER_LABEL));
    }
    out.push('\n');
    out
}

/// Each tuple as `{subject} {relationship} {object} ({certainty} certainty)`,
/// concatenated in order with no separator.
pub fn format_answers(answers: &[Answer]) -> String {
    answers
        .iter()
        .map(|a| {
            format!(
                "{} {} {} ({} certainty)",
                a.subject,
                a.relationship,
                a.object,
                display_value(&a.certainty)
            )
        })
        .collect()
}

pub fn write_answers<W: Write>(out: &mut W, answers: &[Answer]) -> Result<()> {
    writeln!(out, "{}", format_answers(answers)).context("Failed to write answers")?;
    out.flush()?;
    Ok(())
}

/// Numbered-menu asker over any reader/writer pair.
pub struct ManualAsker<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ManualAsker<R, W> {
    pub fn new(input: R, output: W) -> Self {
        ManualAsker { input, output }
    }

    #[cfg(test)]
    pub(crate) fn into_output(self) -> W {
        self.output
    }
}

impl ManualAsker<io::BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        ManualAsker::new(io::BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> Asker for ManualAsker<R, W> {
    fn ask(&mut self, question: &Question) -> Result<QAnswer> {
        let count = question.concepts.len();
        if count == 0 && !question.can_add {
            return Err(DecisionError::NoChoices.into());
        }

        write!(self.output, "{}", render_question(question))?;
        self.output.flush()?;

        let upper = if question.can_add { count } else { count - 1 };
        let index = read_integer(&mut self.input, &mut self.output, 0, upper as i64)? as usize;

        let object = if question.can_add && index == count {
            write!(self.output, "Please enter: ")?;
            self.output.flush()?;
            read_line(&mut self.input)?
        } else {
            question.concepts[index]
                .as_text()
                .ok_or(DecisionError::NonTextConcept { index })?
                .to_string()
        };
        Ok(QAnswer::certain(question, object))
    }
}

/// Items for the selection widget: the text-typed concepts in order, then
/// `Other` when the question allows new values. The second element is the
/// index of `Other`, if present.
pub fn select_items(question: &Question) -> Result<(Vec<String>, Option<usize>)> {
    let mut items: Vec<String> = question
        .concepts
        .iter()
        .filter_map(|c| c.as_text())
        .map(str::to_string)
        .collect();
    let other = question.can_add.then_some(items.len());
    if other.is_some() {
        items.push(OTHER_LABEL.to_string());
    }
    if items.is_empty() {
        return Err(DecisionError::NoChoices.into());
    }
    Ok((items, other))
}

/// Fuzzy-select asker. Only text-typed concepts are offered; an `Other`
/// item opens a text prompt when the question allows new values.
pub struct SelectAsker {
    theme: ColorfulTheme,
}

impl Default for SelectAsker {
    fn default() -> Self {
        SelectAsker {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Asker for SelectAsker {
    fn ask(&mut self, question: &Question) -> Result<QAnswer> {
        let (items, other) = select_items(question)?;

        let selection = FuzzySelect::with_theme(&self.theme)
            .with_prompt(question.prompt.as_str())
            .items(&items)
            .default(0)
            .interact()?;

        let object = if Some(selection) == other {
            Input::<String>::with_theme(&self.theme)
                .with_prompt("Please enter")
                .interact_text()?
        } else {
            items[selection].clone()
        };
        Ok(QAnswer::certain(question, object))
    }
}

/// Shows a spinner on stderr while the remote engine is thinking.
pub struct SpinnerSession<S> {
    inner: S,
}

impl<S: Session> SpinnerSession<S> {
    pub fn new(inner: S) -> Self {
        SpinnerSession { inner }
    }

    fn with_spinner<T>(&mut self, msg: &'static str, f: impl FnOnce(&mut S) -> Result<T>) -> Result<T> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
        spinner.set_message(msg);
        spinner.enable_steady_tick(Duration::from_millis(100));
        let out = f(&mut self.inner);
        spinner.finish_and_clear();
        out
    }
}

impl<S: Session> Session for SpinnerSession<S> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn query(&mut self, subject: &str, relationship: &str, object: &str) -> Result<EngineReply> {
        self.with_spinner("Reasoning...", |s| s.query(subject, relationship, object))
    }

    fn respond(&mut self, answers: &[QAnswer]) -> Result<EngineReply> {
        self.with_spinner("Reasoning...", |s| s.respond(answers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Concept;
    use serde_json::json;
    use std::io::Cursor;

    fn languages(can_add: bool) -> Question {
        Question {
            subject: "Fred".into(),
            relationship: "speaks".into(),
            prompt: "What does Fred speak?".into(),
            concepts: vec![Concept::text("English"), Concept::text("French")],
            can_add,
            ..Default::default()
        }
    }

    fn ask(question: &Question, input: &str) -> (Result<QAnswer>, String) {
        let mut asker = ManualAsker::new(Cursor::new(input.to_string()), Vec::new());
        let answer = asker.ask(question);
        (answer, String::from_utf8(asker.into_output()).unwrap())
    }

    #[test]
    fn test_read_integer_rejects_out_of_range() {
        let mut input = Cursor::new("5\n-1\n1\n");
        let mut out = Vec::new();
        let i = read_integer(&mut input, &mut out, 0, 2).unwrap();
        assert_eq!(i, 1);
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.matches("integer not between 0 and 2").count(), 2);
    }

    #[test]
    fn test_read_integer_rejects_non_integer() {
        let mut input = Cursor::new("two\n\n2\n");
        let mut out = Vec::new();
        assert_eq!(read_integer(&mut input, &mut out, 0, 2).unwrap(), 2);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_read_integer_bounds_are_inclusive() {
        let mut out = Vec::new();
        assert_eq!(read_integer(&mut Cursor::new("0\n"), &mut out, 0, 2).unwrap(), 0);
        assert_eq!(read_integer(&mut Cursor::new(" 2 \n"), &mut out, 0, 2).unwrap(), 2);
        assert!(out.is_empty());
    }

    #[test]
    fn test_read_integer_end_of_input() {
        let err = read_integer(&mut Cursor::new("9\n"), &mut Vec::new(), 0, 2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DecisionError>(),
            Some(DecisionError::InputClosed)
        ));
    }

    #[test]
    fn test_render_question_without_other() {
        assert_eq!(
            render_question(&languages(false)),
            "What does Fred speak?\n\t0\tEnglish\n\t1\tFrench\n"
        );
    }

    #[test]
    fn test_render_question_with_other() {
        assert_eq!(
            render_question(&languages(true)),
            "What does Fred speak?\n\t0\tEnglish\n\t1\tFrench\n\t2\tOther\n"
        );
    }

    #[test]
    fn test_format_answers() {
        let answers = vec![Answer {
            subject: "Fred".into(),
            relationship: "speaks".into(),
            object: "French".into(),
            certainty: json!(100),
        }];
        assert_eq!(format_answers(&answers), "Fred speaks French (100 certainty)");
    }

    #[test]
    fn test_format_answers_keeps_order_without_separator() {
        let answer = |object: &str, cf: serde_json::Value| Answer {
            subject: "Fred".into(),
            relationship: "speaks".into(),
            object: object.into(),
            certainty: cf,
        };
        let answers = vec![answer("French", json!(100)), answer("German", json!("60"))];
        assert_eq!(
            format_answers(&answers),
            "Fred speaks French (100 certainty)Fred speaks German (60 certainty)"
        );
    }

    #[test]
    fn test_write_answers_ends_with_newline() {
        let mut out = Vec::new();
        write_answers(&mut out, &[]).unwrap();
        assert_eq!(out, b"\n");
    }

    #[test]
    fn test_manual_asker_picks_candidate() {
        let (answer, out) = ask(&languages(false), "1\n");
        let answer = answer.unwrap();
        assert_eq!(answer.object, "French");
        assert_eq!(answer.subject, "Fred");
        assert_eq!(answer.relationship, "speaks");
        assert_eq!(answer.cf, "100");
        assert!(out.starts_with("What does Fred speak?"));
    }

    #[test]
    fn test_manual_asker_other_reads_free_text() {
        let (answer, out) = ask(&languages(true), "2\nOld Norse\n");
        assert_eq!(answer.unwrap().object, "Old Norse");
        assert!(out.ends_with("Please enter: "));
    }

    #[test]
    fn test_manual_asker_other_index_rejected_without_can_add() {
        let (answer, out) = ask(&languages(false), "2\n0\n");
        assert_eq!(answer.unwrap().object, "English");
        assert!(out.contains("integer not between 0 and 1"));
    }

    #[test]
    fn test_manual_asker_non_text_concept() {
        let question = Question {
            prompt: "How old is Fred?".into(),
            concepts: vec![Concept {
                name: "forty".into(),
                value: json!(40),
                concept_type: None,
            }],
            ..Default::default()
        };
        let (answer, out) = ask(&question, "0\n");
        let err = answer.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DecisionError>(),
            Some(DecisionError::NonTextConcept { index: 0 })
        ));
        assert!(out.contains("\t0\t40"));
    }

    #[test]
    fn test_manual_asker_no_choices() {
        let question = Question {
            prompt: "Anything?".into(),
            ..Default::default()
        };
        let (answer, out) = ask(&question, "0\n");
        assert!(matches!(
            answer.unwrap_err().downcast_ref::<DecisionError>(),
            Some(DecisionError::NoChoices)
        ));
        assert!(out.is_empty());
    }

    fn mixed(can_add: bool) -> Question {
        Question {
            prompt: "What does Fred speak?".into(),
            concepts: vec![
                Concept::text("English"),
                Concept {
                    name: "seven".into(),
                    value: json!(7),
                    concept_type: None,
                },
                Concept::text("French"),
            ],
            can_add,
            ..Default::default()
        }
    }

    #[test]
    fn test_select_items_skips_non_text_concepts() {
        let (items, other) = select_items(&mixed(false)).unwrap();
        assert_eq!(items, vec!["English", "French"]);
        assert_eq!(other, None);
    }

    #[test]
    fn test_select_items_other_follows_text_concepts() {
        let (items, other) = select_items(&mixed(true)).unwrap();
        assert_eq!(items, vec!["English", "French", "Other"]);
        assert_eq!(other, Some(2));
    }

    #[test]
    fn test_select_items_only_other() {
        let question = Question {
            concepts: vec![Concept {
                name: "seven".into(),
                value: json!(7),
                concept_type: None,
            }],
            can_add: true,
            ..Default::default()
        };
        let (items, other) = select_items(&question).unwrap();
        assert_eq!(items, vec!["Other"]);
        assert_eq!(other, Some(0));
    }

    #[test]
    fn test_select_items_no_text_and_no_other() {
        let mut question = mixed(false);
        question.concepts.retain(|c| c.as_text().is_none());
        let err = select_items(&question).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DecisionError>(),
            Some(DecisionError::NoChoices)
        ));
    }

    #[test]
    fn test_manual_asker_free_text_only() {
        let question = Question {
            subject: "Fred".into(),
            relationship: "lives in".into(),
            prompt: "Where does Fred live?".into(),
            can_add: true,
            ..Default::default()
        };
        let (answer, out) = ask(&question, "0\nParis\r\n");
        assert_eq!(answer.unwrap().object, "Paris");
        assert!(out.contains("\t0\tOther"));
    }
}
