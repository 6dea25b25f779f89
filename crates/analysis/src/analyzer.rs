use crate::tokenizer::{LocalNameTokenizer, Token};

/// A token as seen by the suggestion index: lowercased term plus the surface span it
/// came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub term: String,
    pub position: usize,
    pub token: Token,
}

/// Tokenizes with [`LocalNameTokenizer`] and lowercases every token.
///
/// The same analysis runs on indexed texts and on queries so that matching is
/// case-insensitive while highlights keep the original casing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalNameAnalyzer;

impl LocalNameAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn analyze(&self, text: &str) -> Vec<Term> {
        LocalNameTokenizer::new(text)
            .enumerate()
            .map(|(position, token)| Term {
                term: token.text.to_lowercase(),
                position,
                token,
            })
            .collect()
    }

    /// Lowercased terms only.
    #[must_use]
    pub fn terms(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|t| t.term).collect()
    }
}

/// Parsed query: every term but the last must match a whole indexed term, the last one
/// may be a prefix when it runs to the end of the input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryTerms {
    pub exact: Vec<String>,
    pub prefix: Option<String>,
}

impl QueryTerms {
    #[must_use]
    pub fn parse(analyzer: &LocalNameAnalyzer, query: &str) -> Self {
        let mut terms = analyzer.analyze(query);
        let query_len = query.chars().count();
        let prefix = match terms.last() {
            Some(last) if last.token.end == query_len => terms.pop().map(|t| t.term),
            _ => None,
        };
        Self {
            exact: terms.into_iter().map(|t| t.term).collect(),
            prefix,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefix.is_none()
    }
}
