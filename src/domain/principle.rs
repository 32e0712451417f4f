//! Principle records and the deterministic identity assigner.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Sentinel category for principles whose section header is unrecognized.
pub const GENERAL_CATEGORY: &str = "general";

/// Maximum length of the slug portion of a principle id.
const MAX_SLUG_LEN: usize = 50;

/// A single addressable unit of policy.
///
/// Created at ingestion time; superseded (never mutated) when its source
/// document is re-ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Principle {
    /// Globally unique id, a pure function of (domain prefix, category, title).
    pub id: String,

    /// Name of the owning domain.
    pub domain: String,

    /// Category derived from the enclosing section header.
    pub category: String,

    /// Human-readable name, the semantic seed for the id.
    pub title: String,

    /// Full content block, used for embedding and retrieval context.
    pub body_text: String,
}

impl Principle {
    /// Create a principle, deriving its id from the given domain prefix.
    pub fn new(
        domain_prefix: &str,
        domain: impl Into<String>,
        category: impl Into<String>,
        title: impl Into<String>,
        body_text: impl Into<String>,
    ) -> Self {
        let category = category.into();
        let title = title.into();
        Self {
            id: generate_id(domain_prefix, &category, &title),
            domain: domain.into(),
            category,
            title,
            body_text: body_text.into(),
        }
    }

    /// Text the index builder embeds for this principle.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.body_text)
    }
}

/// Generate the deterministic id for a principle.
///
/// Pure function of its inputs: the same (prefix, category, title) always
/// yields the same id.
pub fn generate_id(domain_prefix: &str, category: &str, title: &str) -> String {
    format!("{}-{}-{}", domain_prefix, category, slugify(title))
}

/// Slugify a title: lowercase, punctuation/whitespace runs collapse to a
/// single hyphen, truncated to 50 chars at a word boundary, with leading
/// and trailing hyphens stripped.
fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_hyphen = false;

    for ch in title.chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
            last_hyphen = false;
        } else if !last_hyphen && !slug.is_empty() {
            slug.push('-');
            last_hyphen = true;
        }
    }

    if slug.chars().count() > MAX_SLUG_LEN {
        // Cut at the last word boundary so no word is split mid-way.
        let head: String = slug.chars().take(MAX_SLUG_LEN).collect();
        let splits_word = slug.chars().nth(MAX_SLUG_LEN) != Some('-');
        slug = if splits_word {
            match head.rfind('-') {
                Some(idx) => head[..idx].to_string(),
                None => head,
            }
        } else {
            head
        };
    }

    slug.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_deterministic() {
        let first = generate_id("coding", "context", "Specification Completeness");
        let second = generate_id("coding", "context", "Specification Completeness");
        assert_eq!(first, second);
    }

    #[test]
    fn test_generate_id_example() {
        assert_eq!(
            generate_id("coding", "context", "Specification Completeness"),
            "coding-context-specification-completeness"
        );
    }

    #[test]
    fn test_punctuation_runs_collapse() {
        assert_eq!(
            generate_id("meta", "safety", "Non-Maleficence -- First, Do No Harm"),
            "meta-safety-non-maleficence-first-do-no-harm"
        );
    }

    #[test]
    fn test_truncation_at_word_boundary() {
        let title = "An Extremely Verbose Principle Title That Goes On And On Far Too Long";
        let id = generate_id("coding", "process", title);
        let slug = id.strip_prefix("coding-process-").unwrap();

        assert!(slug.len() <= 50);
        // No word may be split: the slug must be a prefix of the full slug
        // ending exactly at a hyphen boundary.
        let full = "an-extremely-verbose-principle-title-that-goes-on-and-on-far-too-long";
        assert!(full.starts_with(slug));
        assert_eq!(full.as_bytes()[slug.len()], b'-');
    }

    #[test]
    fn test_truncation_exact_boundary_kept() {
        // The 50th char lands exactly on a word boundary: the head is kept whole.
        let slug = slugify("aaaaaaaaaa bbbbbbbbbb cccccccccc dddddddddd eeeeee x");
        assert_eq!(slug.len(), 50);
        assert!(slug.ends_with("eeeeee"));
    }

    #[test]
    fn test_leading_trailing_hyphens_stripped() {
        assert_eq!(slugify("  (Quoted Title)  "), "quoted-title");
    }

    #[test]
    fn test_principle_new_assigns_id() {
        let p = Principle::new(
            "coding",
            "ai-coding",
            "context",
            "Specification Completeness",
            "Definition: every requirement is stated.",
        );
        assert_eq!(p.id, "coding-context-specification-completeness");
        assert!(p.embedding_text().contains("Specification Completeness"));
    }
}
