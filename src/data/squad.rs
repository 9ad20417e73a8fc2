// ============================================================
// Layer 4 — SQuAD Reader
// ============================================================
// Parses SQuAD-format JSON into flat (question, context,
// answer) examples.
//
// File layout:
//   { "data": [ { "title": ..., "paragraphs": [
//       { "context": "...",
//         "qas": [ { "id": "...", "question": "...",
//                    "answers": [ { "text": "...", "answer_start": 42 } ] } ] } ] } ] }
//
// Only the first answer of each question is used. Test files
// may leave `answers` out entirely.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Debug, Deserialize)]
struct SquadFile {
    data: Vec<SquadArticle>,
}

#[derive(Debug, Deserialize)]
struct SquadArticle {
    paragraphs: Vec<SquadParagraph>,
}

#[derive(Debug, Deserialize)]
struct SquadParagraph {
    context: String,
    qas:     Vec<SquadQuestion>,
}

#[derive(Debug, Deserialize)]
struct SquadQuestion {
    id:       String,
    question: String,
    #[serde(default)]
    answers:  Vec<SquadAnswer>,
}

/// An answer as given in the file: text plus its char offset in the context.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SquadAnswer {
    pub text:         String,
    pub answer_start: usize,
}

impl SquadAnswer {
    /// Char offset one past the last answer char.
    pub fn answer_end(&self) -> usize {
        self.answer_start + self.text.chars().count()
    }
}

/// One question over one context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquadExample {
    pub id:       String,
    pub question: String,
    pub context:  String,
    pub answer:   Option<SquadAnswer>,
}

pub fn parse_squad(json: &str) -> Result<Vec<SquadExample>> {
    let file: SquadFile = serde_json::from_str(json).context("Malformed SQuAD JSON")?;

    let examples = file
        .data
        .into_iter()
        .flat_map(|article| article.paragraphs)
        .flat_map(|para| {
            let context = para.context;
            para.qas.into_iter().map(move |qa| SquadExample {
                id:       qa.id,
                question: qa.question,
                context:  context.clone(),
                answer:   qa.answers.into_iter().next(),
            })
        })
        .collect();

    Ok(examples)
}

pub fn read_squad(path: &Path) -> Result<Vec<SquadExample>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read SQuAD file '{}'", path.display()))?;
    let examples = parse_squad(&json)
        .with_context(|| format!("Cannot parse SQuAD file '{}'", path.display()))?;
    tracing::info!("Read {} questions from '{}'", examples.len(), path.display());
    Ok(examples)
}
