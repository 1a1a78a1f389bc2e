//! Free-text query parsing.
//!
//! Supported syntax:
//!
//! | Form         | Meaning                                          |
//! |--------------|--------------------------------------------------|
//! | `word`       | optional term; matches rank by relevance         |
//! | `+word`      | required term                                    |
//! | `-word`      | excluded term                                    |
//! | `word*`      | any term starting with `word`                    |
//! | `a AND b`    | both words required                              |
//! | `a OR b`     | either word; the same as `a b`                   |
//! | `NOT word`   | excluded term                                    |
//! | `"a b"`      | every word of the phrase required                |
//! | `-"a b"`     | documents containing any word of the phrase dropped |
//!
//! The boolean operators are recognised only in upper case; `and`, `or` and
//! `not` are ordinary words. Phrases match their words anywhere in the
//! document, as the index keeps no positions. An explicit `+` or `-` on a
//! word wins over a preceding operator.
//!
//! Each word is passed through the index [`Analyzer`], so a word may expand
//! into several terms (`e-mail` -> `e`, `mail`) and every term the
//! indexer produced can be matched by typing it back. Text that yields no
//! term is not an error; it parses to an empty query that matches nothing.

use std::sync::Arc;

use crate::analysis::Analyzer;

/// How a clause constrains matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Occur {
    /// Contributes to the score; at least one positive clause must match.
    Should,
    /// Every `Must` clause has to match.
    Must,
    /// Documents matching any `MustNot` clause are dropped.
    MustNot,
}

/// What a clause matches in the term dictionary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TermMatch {
    Exact(String),
    Prefix(String),
}

impl TermMatch {
    pub fn text(&self) -> &str {
        match self {
            TermMatch::Exact(term) | TermMatch::Prefix(term) => term,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryClause {
    pub occur: Occur,
    pub term: TermMatch,
}

/// A parsed query: a flat list of clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    clauses: Vec<QueryClause>,
}

impl ParsedQuery {
    pub fn new(clauses: Vec<QueryClause>) -> Self {
        ParsedQuery { clauses }
    }

    pub fn clauses(&self) -> &[QueryClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether any clause can select documents. A query of only `-word`
    /// clauses cannot.
    pub fn has_positive_clause(&self) -> bool {
        self.clauses.iter().any(|c| c.occur != Occur::MustNot)
    }
}

/// Parses query text with the index's analyzer.
#[derive(Debug, Clone)]
pub struct QueryParser {
    analyzer: Arc<dyn Analyzer>,
}

impl QueryParser {
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        QueryParser { analyzer }
    }

    pub fn parse(&self, text: &str) -> ParsedQuery {
        let mut clauses: Vec<QueryClause> = Vec::new();
        // Set by AND / NOT for the next word.
        let mut pending: Option<Occur> = None;
        // Clauses of the previous word, promoted by a following AND.
        let mut previous = 0..0;

        for token in tokenize(text) {
            let start = clauses.len();
            match token {
                Token::And => {
                    for clause in &mut clauses[previous.clone()] {
                        if clause.occur == Occur::Should {
                            clause.occur = Occur::Must;
                        }
                    }
                    pending = Some(Occur::Must);
                    continue;
                }
                Token::Or => {
                    pending = None;
                    continue;
                }
                Token::Not => {
                    pending = Some(Occur::MustNot);
                    continue;
                }
                Token::Word(word) => {
                    let (sign, rest) = split_operator(word);
                    let occur = sign.or(pending.take()).unwrap_or(Occur::Should);
                    let (rest, is_prefix) = match rest.strip_suffix('*') {
                        Some(stem) => (stem, true),
                        None => (rest, false),
                    };

                    let terms = self.analyzer.analyze(rest);
                    let last = terms.len().saturating_sub(1);
                    for (i, term) in terms.into_iter().enumerate() {
                        let term = if is_prefix && i == last {
                            TermMatch::Prefix(term)
                        } else {
                            TermMatch::Exact(term)
                        };
                        clauses.push(QueryClause { occur, term });
                    }
                }
                Token::Phrase(sign, phrase) => {
                    let occur = sign.or(pending.take()).unwrap_or(Occur::Must);
                    for term in self.analyzer.analyze(phrase) {
                        clauses.push(QueryClause {
                            occur,
                            term: TermMatch::Exact(term),
                        });
                    }
                }
            }
            previous = start..clauses.len();
        }

        log::trace!("parsed query {text:?} into {} clauses", clauses.len());
        ParsedQuery { clauses }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    /// Quoted text, with the `+`/`-` written before the opening quote.
    Phrase(Option<Occur>, &'a str),
    And,
    Or,
    Not,
}

/// Split query text into words, quoted phrases and boolean operators. An
/// unterminated quote runs to the end of the text.
fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        let (sign, unsigned) = match rest.strip_prefix('+') {
            Some(after) => (Some(Occur::Must), after),
            None => match rest.strip_prefix('-') {
                Some(after) => (Some(Occur::MustNot), after),
                None => (None, rest),
            },
        };
        if let Some(quoted) = unsigned.strip_prefix('"') {
            let end = quoted.find('"').unwrap_or(quoted.len());
            tokens.push(Token::Phrase(sign, &quoted[..end]));
            rest = quoted.get(end + 1..).unwrap_or("").trim_start();
            continue;
        }

        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        tokens.push(match &rest[..end] {
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            word => Token::Word(word),
        });
        rest = rest[end..].trim_start();
    }
    tokens
}

fn split_operator(word: &str) -> (Option<Occur>, &str) {
    if let Some(rest) = word.strip_prefix('+')
        && !rest.is_empty()
    {
        return (Some(Occur::Must), rest);
    }
    if let Some(rest) = word.strip_prefix('-')
        && !rest.is_empty()
    {
        return (Some(Occur::MustNot), rest);
    }
    (None, word)
}
