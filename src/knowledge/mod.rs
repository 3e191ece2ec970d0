//! Packing-guideline corpus and similarity retrieval
//!
//! The corpus is plain text. Blocks are separated by blank lines; a block
//! that is entirely upper-case, or that contains a `====` rule, starts a new
//! section, and the blocks after it form that section's passage.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

mod index;

pub use index::{KnowledgeIndex, Retriever, ScoredSnippet, cosine_similarity};

/// Corpus compiled into the binary
const BUILTIN_CORPUS: &str = include_str!("../../data/wardrobe_rules.txt");

/// One passage of guidance and the section it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSnippet {
    pub section: String,
    pub text: String,
}

impl KnowledgeSnippet {
    /// Text sent to the embedding model
    #[must_use]
    pub fn embedding_text(&self) -> String {
        if self.section.is_empty() {
            self.text.clone()
        } else {
            format!("{}\n\n{}", self.section, self.text)
        }
    }
}

/// Read-only collection of snippets, loaded once per process
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    snippets: Vec<KnowledgeSnippet>,
}

impl Corpus {
    /// Parse corpus text into section passages
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let normalized = content.replace("\r\n", "\n");
        let mut snippets = Vec::new();
        let mut section = String::new();
        let mut body: Vec<&str> = Vec::new();

        for block in split_blocks(&normalized) {
            if is_heading(block) {
                if !body.is_empty() {
                    snippets.push(KnowledgeSnippet {
                        section: section.clone(),
                        text: body.join("\n\n"),
                    });
                    body.clear();
                }
                section = block.replace('=', "").trim().to_string();
            } else {
                body.push(block);
            }
        }

        if !body.is_empty() {
            snippets.push(KnowledgeSnippet {
                section,
                text: body.join("\n\n"),
            });
        }

        debug!("Parsed corpus into {} passages", snippets.len());
        Self { snippets }
    }

    /// The corpus shipped with the binary
    #[must_use]
    pub fn builtin() -> Self {
        Self::parse(BUILTIN_CORPUS)
    }

    /// Load from `path`, or the built-in corpus when no path is configured
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let corpus = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read corpus file {}", path.display()))?;
                Self::parse(&content)
            }
            None => Self::builtin(),
        };
        info!("Loaded knowledge corpus with {} passages", corpus.len());
        Ok(corpus)
    }

    #[must_use]
    pub fn snippets(&self) -> &[KnowledgeSnippet] {
        &self.snippets
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}

fn split_blocks(content: &str) -> impl Iterator<Item = &str> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
}

fn is_heading(block: &str) -> bool {
    block.contains("====")
        || (block.chars().any(char::is_alphabetic) && !block.chars().any(char::is_lowercase))
}
