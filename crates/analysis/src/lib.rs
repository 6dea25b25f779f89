//! # Autocomplete Analysis
//!
//! Text analysis shared by indexing and querying.
//!
//! ## Pipeline
//!
//! ```text
//! "USRegion"
//!     │
//!     ├──> LocalNameTokenizer
//!     │      └─> US(0,2) Region(2,8)
//!     │
//!     └──> LocalNameAnalyzer (lowercase)
//!            └─> us region
//! ```
//!
//! ## Example
//!
//! ```
//! use autocomplete_analysis::{tokenize, LocalNameAnalyzer};
//!
//! let tokens = tokenize("IvanPetrov");
//! assert_eq!(tokens[1].text, "Petrov");
//!
//! let terms = LocalNameAnalyzer::new().terms("USSR");
//! assert_eq!(terms, vec!["ussr".to_string()]);
//! ```

mod analyzer;
mod tokenizer;

pub use analyzer::{LocalNameAnalyzer, QueryTerms, Term};
pub use tokenizer::{tokenize, LocalNameTokenizer, Token};
