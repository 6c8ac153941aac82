//! Parsing of the structured issue critique returned by the LLM.
//!
//! Expected shape:
//!
//! ```text
//! SUMMARY:
//! - first observation
//! - second observation
//! - third observation
//!
//! DRAFT_COMMENT:
//! ...
//!
//! DRAFT_REWRITE:
//! ...
//!
//! CONFIDENCE: 0.8
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const SUMMARY_POINTS: usize = 3;
const MISSING_POINT: &str = "Analysis point not provided";
const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Section {
    Summary,
    DraftComment,
    DraftRewrite,
    Confidence,
}

impl Section {
    const ALL: [Section; 4] = [
        Self::Summary,
        Self::DraftComment,
        Self::DraftRewrite,
        Self::Confidence,
    ];

    fn marker(self) -> &'static str {
        match self {
            Self::Summary => "SUMMARY:",
            Self::DraftComment => "DRAFT_COMMENT:",
            Self::DraftRewrite => "DRAFT_REWRITE:",
            Self::Confidence => "CONFIDENCE:",
        }
    }

    /// Matches a line that opens a section, returning any text after the marker.
    fn opening(line: &str) -> Option<(Self, &str)> {
        Self::ALL.into_iter().find_map(|section| {
            let marker = section.marker();
            let head = line.get(..marker.len())?;
            head.eq_ignore_ascii_case(marker)
                .then(|| (section, line[marker.len()..].trim()))
        })
    }
}

/// A structured critique of an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    /// Exactly three observations.
    pub summary: Vec<String>,
    pub draft_comment: String,
    pub draft_rewrite: String,
    /// In `[0, 1]`.
    pub confidence: f64,
}

impl Critique {
    /// The critique used when the response has no recognizable sections.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            summary: vec![
                "Analysis parsing failed".to_string(),
                "Manual review recommended".to_string(),
                "Raw response available in logs".to_string(),
            ],
            draft_comment: "Analysis could not be completed. Please review manually.".to_string(),
            draft_rewrite: "Original issue content should be reviewed manually.".to_string(),
            confidence: 0.0,
        }
    }

    /// Parses an LLM response. Never fails: a response without any section
    /// marker yields [`Critique::fallback`].
    #[must_use]
    pub fn parse(response: &str) -> Self {
        Self::parse_sections(response).unwrap_or_else(Self::fallback)
    }

    /// Parses an LLM response, returning `None` when it has no section
    /// marker at all.
    #[must_use]
    pub fn parse_sections(response: &str) -> Option<Self> {
        let sections = split_sections(response);
        if sections.is_empty() {
            return None;
        }

        let section = |s: Section| sections.get(&s).map(String::as_str).filter(|t| !t.is_empty());

        let mut summary: Vec<String> = section(Section::Summary)
            .unwrap_or_default()
            .lines()
            .filter_map(|line| line.trim().strip_prefix('-'))
            .map(|point| point.trim().to_string())
            .filter(|point| !point.is_empty())
            .take(SUMMARY_POINTS)
            .collect();
        summary.resize(SUMMARY_POINTS, MISSING_POINT.to_string());

        Some(Self {
            summary,
            draft_comment: section(Section::DraftComment)
                .unwrap_or("No comment provided")
                .to_string(),
            draft_rewrite: section(Section::DraftRewrite)
                .unwrap_or("No rewrite provided")
                .to_string(),
            confidence: section(Section::Confidence)
                .map_or(DEFAULT_CONFIDENCE, parse_confidence),
        })
    }
}

fn split_sections(response: &str) -> HashMap<Section, String> {
    let mut sections = HashMap::new();
    let mut current: Option<(Section, Vec<&str>)> = None;

    for line in response.lines().map(str::trim) {
        if let Some((section, rest)) = Section::opening(line) {
            if let Some((done, body)) = current.take() {
                sections.insert(done, body.join("\n").trim().to_string());
            }
            let body = if rest.is_empty() { Vec::new() } else { vec![rest] };
            current = Some((section, body));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((done, body)) = current {
        sections.insert(done, body.join("\n").trim().to_string());
    }
    sections
}

fn parse_confidence(text: &str) -> f64 {
    let token = text
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_matches(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'));
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => value.clamp(0.0, 1.0),
        _ => DEFAULT_CONFIDENCE,
    }
}
