//! Structured document parser and identity assigner.
//!
//! Recognizes `## Section` headers and `### Title` principle blocks. A block
//! only becomes a principle if its body carries at least one indicator label;
//! everything else is narrative and is skipped.

use std::fs;
use std::path::Path;

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{generate_id, Principle, GENERAL_CATEGORY};
use crate::error::{GovernError, GovernResult};

/// Labels that mark a block as a principle rather than narrative prose.
const INDICATOR_LABELS: [&str; 4] = ["Definition", "Failure Mode", "Countermeasure", "Example"];

/// Recognized section headers and the category each maps to.
/// Headers matching none of these fall back to `general` with a warning.
const CATEGORY_TABLE: [(&str, &str); 6] = [
    ("context", "context"),
    ("safety", "safety"),
    ("process", "process"),
    ("quality", "quality"),
    ("collaboration", "collaboration"),
    ("meta", "meta"),
];

/// Non-fatal observations recorded during a document pass.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestionWarning {
    /// A section header matched no known category; its principles were
    /// assigned the `general` category.
    UnrecognizedSection { header: String, line: usize },
    /// A later principle replaced an earlier one with the same generated id.
    DuplicateId { id: String },
}

impl std::fmt::Display for IngestionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestionWarning::UnrecognizedSection { header, line } => {
                write!(f, "unrecognized section header '{}' at line {}", header, line)
            }
            IngestionWarning::DuplicateId { id } => {
                write!(f, "duplicate principle id '{}', later occurrence kept", id)
            }
        }
    }
}

/// Result of one document pass.
#[derive(Debug, Clone)]
pub struct ParseReport {
    /// Principles in document order; on id collision the later occurrence
    /// occupies the earlier one's position.
    pub principles: Vec<Principle>,
    pub warnings: Vec<IngestionWarning>,
    /// Candidate blocks dropped for lacking an indicator label.
    pub skipped_blocks: usize,
}

/// Parse a document read from disk. Failures affect this document only.
pub fn parse_document_file(
    path: impl AsRef<Path>,
    domain_prefix: &str,
    domain_name: &str,
) -> GovernResult<ParseReport> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| GovernError::Ingestion {
        document: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(parse_document(&text, domain_prefix, domain_name))
}

/// Parse structured policy text into principle records for one domain.
pub fn parse_document(text: &str, domain_prefix: &str, domain_name: &str) -> ParseReport {
    let mut report = ParseReport {
        principles: Vec::new(),
        warnings: Vec::new(),
        skipped_blocks: 0,
    };

    let mut category = GENERAL_CATEGORY.to_string();
    let mut current_block: Option<(String, Vec<String>)> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;

        if let Some(header) = line.strip_prefix("## ").map(str::trim) {
            flush_block(
                current_block.take(),
                &category,
                domain_prefix,
                domain_name,
                &mut report,
            );
            category = match category_for_header(header) {
                Some(cat) => cat.to_string(),
                None => {
                    report.warnings.push(IngestionWarning::UnrecognizedSection {
                        header: header.to_string(),
                        line: line_no,
                    });
                    GENERAL_CATEGORY.to_string()
                }
            };
        } else if let Some(title) = line.strip_prefix("### ").map(str::trim) {
            flush_block(
                current_block.take(),
                &category,
                domain_prefix,
                domain_name,
                &mut report,
            );
            current_block = Some((title.to_string(), Vec::new()));
        } else if let Some((_, body)) = current_block.as_mut() {
            body.push(line.to_string());
        }
    }

    flush_block(
        current_block.take(),
        &category,
        domain_prefix,
        domain_name,
        &mut report,
    );

    report
}

/// Finish the current candidate block, emitting a principle if it qualifies.
fn flush_block(
    block: Option<(String, Vec<String>)>,
    category: &str,
    domain_prefix: &str,
    domain_name: &str,
    report: &mut ParseReport,
) {
    let Some((title, body_lines)) = block else {
        return;
    };
    let body_text = body_lines.join("\n").trim().to_string();

    if !has_indicator(&body_text) {
        tracing::debug!(title = %title, "Block lacks indicator label, skipped");
        report.skipped_blocks += 1;
        return;
    }

    let id = generate_id(domain_prefix, category, &title);
    let principle = Principle {
        id: id.clone(),
        domain: domain_name.to_string(),
        category: category.to_string(),
        title,
        body_text,
    };

    // Later occurrence silently replaces the earlier holder of the id,
    // but the replacement is recorded so it stays observable.
    if let Some(existing) = report.principles.iter_mut().find(|p| p.id == id) {
        report.warnings.push(IngestionWarning::DuplicateId { id });
        *existing = principle;
    } else {
        report.principles.push(principle);
    }
}

/// Map a section header to its category, if recognized.
fn category_for_header(header: &str) -> Option<&'static str> {
    let lowered = header.to_lowercase();
    CATEGORY_TABLE
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, category)| *category)
}

fn has_indicator(body: &str) -> bool {
    INDICATOR_LABELS.iter().any(|label| body.contains(label))
}
