//! Prompt and interaction detection for shell output.
//!
//! Output arrives in arbitrary chunks. Complete lines are only inspected for
//! errors; the trailing partial line is what decides whether the device is
//! waiting at a prompt, showing a pager, or asking a question.

use log::trace;
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

use super::dialect::Dialect;

/// Leading carriage returns and backspaces some devices emit when redrawing a line.
pub static IGNORE_START_LINE: Lazy<Regex> =
    Lazy::new(
        || match Regex::new(r"^(\r+(\s+\r+)*)|(\u{8}+(\s+\u{8}+)*)") {
            Ok(re) => re,
            Err(err) => panic!("invalid IGNORE_START_LINE regex: {err}"),
        },
    );

/// What the trailing, newline-less part of the output means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tail<'a> {
    /// The device is ready for the next command.
    Prompt { config: bool },
    /// A pager is waiting for a keypress.
    More,
    /// A question to answer with the given text.
    Confirm(&'a str),
    /// Nothing actionable yet.
    Pending,
}

/// Compiled dialect patterns.
#[derive(Debug)]
pub struct PromptMatcher {
    prompts: RegexSet,
    /// Number of exec prompts at the start of `prompts`; the rest are config prompts.
    exec_count: usize,
    more: RegexSet,
    errors: RegexSet,
    confirmations: RegexSet,
    answers: Vec<&'static str>,
}

impl PromptMatcher {
    pub fn new(dialect: &Dialect) -> Result<Self, regex::Error> {
        let prompts = RegexSet::new(
            dialect
                .exec_prompts
                .iter()
                .chain(dialect.config_prompts.iter()),
        )?;
        Ok(Self {
            prompts,
            exec_count: dialect.exec_prompts.len(),
            more: RegexSet::new(dialect.more_patterns)?,
            errors: RegexSet::new(dialect.error_patterns)?,
            confirmations: RegexSet::new(dialect.confirmations.iter().map(|(re, _)| *re))?,
            answers: dialect.confirmations.iter().map(|(_, a)| *a).collect(),
        })
    }

    /// Classifies the trailing partial line of the output.
    pub fn classify_tail(&self, tail: &str) -> Tail<'static> {
        let line = IGNORE_START_LINE.replace(tail, "");
        let line = line.trim_end_matches(['\r', '\n']);
        trace!("Classifying tail: '{:?}'", line);

        if let Some(index) = self.confirmations.matches(line).into_iter().next() {
            return Tail::Confirm(self.answers[index]);
        }
        if self.more.is_match(line) {
            return Tail::More;
        }
        let matched: Vec<usize> = self.prompts.matches(line).into_iter().collect();
        if matched.is_empty() {
            return Tail::Pending;
        }
        Tail::Prompt {
            config: matched.iter().any(|i| *i >= self.exec_count),
        }
    }

    pub fn is_prompt(&self, line: &str) -> bool {
        matches!(self.classify_tail(line), Tail::Prompt { .. })
    }

    /// First line of `output` matching a device error pattern.
    pub fn first_error(&self, output: &str) -> Option<String> {
        output
            .lines()
            .map(|line| IGNORE_START_LINE.replace(line, "").trim_end().to_string())
            .find(|line| self.errors.is_match(line))
    }

    pub fn has_error(&self, output: &str) -> bool {
        self.first_error(output).is_some()
    }

    /// Whether a line is a pager marker.
    pub fn is_more(&self, line: &str) -> bool {
        self.more.is_match(line.trim_end())
    }
}
