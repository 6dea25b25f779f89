//! Line based triples: `<s> <p> <o> .` with `"literal"@lang` and `_:blank` terms.

use anyhow::{bail, Context as AnyhowContext, Result};
use autocomplete_index::Value;
use regex::Regex;
use std::path::Path;

const TERM_PATTERN: &str =
    r#"^\s*(?:<([^<>\s]*)>|"((?:[^"\\]|\\.)*)"(?:@([A-Za-z][A-Za-z0-9-]*))?|_:([^\s.]+))"#;

pub type Triple = (Value, Value, Value);

pub fn parse_file(path: &Path) -> Result<Vec<Triple>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read triples from {}", path.display()))?;
    parse(&text).with_context(|| format!("Invalid triples in {}", path.display()))
}

pub fn parse(text: &str) -> Result<Vec<Triple>> {
    let term = Regex::new(TERM_PATTERN).context("Failed to compile the term pattern")?;
    let mut triples = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let triple = parse_line(&term, line).with_context(|| format!("line {}: {line}", idx + 1))?;
        triples.push(triple);
    }
    Ok(triples)
}

fn parse_line(term: &Regex, line: &str) -> Result<Triple> {
    let mut rest = line;
    let subject = next_term(term, &mut rest)?;
    let predicate = next_term(term, &mut rest)?;
    let object = next_term(term, &mut rest)?;
    let tail = rest.trim();
    if !(tail.is_empty() || tail == ".") {
        bail!("unexpected trailing input {tail:?}");
    }
    if matches!(subject, Value::Literal { .. }) {
        bail!("subject must be an IRI or a blank node");
    }
    if predicate.as_iri().is_none() {
        bail!("predicate must be an IRI");
    }
    Ok((subject, predicate, object))
}

fn next_term(term: &Regex, rest: &mut &str) -> Result<Value> {
    let Some(captures) = term.captures(rest) else {
        bail!("expected <iri>, \"literal\" or _:blank at {:?}", rest.trim());
    };
    let value = if let Some(iri) = captures.get(1) {
        Value::iri(iri.as_str())
    } else if let Some(label) = captures.get(2) {
        let label = unescape(label.as_str());
        match captures.get(3) {
            Some(language) => Value::lang_literal(&label, language.as_str()),
            None => Value::literal(&label),
        }
    } else if let Some(blank) = captures.get(4) {
        Value::BlankNode(blank.as_str().to_string())
    } else {
        bail!("unrecognized term at {:?}", rest.trim());
    };
    let consumed = captures.get(0).map_or(0, |m| m.end());
    *rest = &rest[consumed..];
    Ok(value)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_iris_literals_and_blank_nodes() {
        let triples = parse(
            r#"
            # capitals
            <urn:USRegion> <http://www.w3.org/2000/01/rdf-schema#label> "САЩ"@bg .
            <urn:Sofia> <urn:says> "say \"hi\"" .
            _:b1 <urn:near> <urn:Sofia>
            "#,
        )
        .expect("parse");
        assert_eq!(triples.len(), 3);
        assert_eq!(triples[0].2, Value::lang_literal("САЩ", "bg"));
        assert_eq!(triples[1].2, Value::literal("say \"hi\""));
        assert_eq!(triples[2].0, Value::BlankNode("b1".to_string()));
    }

    #[test]
    fn reports_the_offending_line() {
        let err = parse("<urn:a> <urn:b> <urn:c> .\n<urn:a> \"p\" <urn:c> .").expect_err("bad predicate");
        let message = format!("{err:#}");
        assert!(message.contains("line 2"), "{message}");
        assert!(message.contains("predicate must be an IRI"), "{message}");

        assert!(parse("<urn:a> <urn:b>").is_err());
        assert!(parse("<urn:a> <urn:b> <urn:c> extra").is_err());
    }
}
