//! Query execution over a [`ReadSnapshot`].

use std::collections::{BTreeMap, BTreeSet};

use crate::lexical::posting::PostingList;
use crate::lexical::query::{Occur, ParsedQuery, TermMatch};
use crate::lexical::scoring::{Bm25, Bm25Params};
use crate::lexical::snapshot::ReadSnapshot;

/// One ranked match.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub doc_id: String,
    pub score: f32,
}

/// One page of ranked matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    /// Matches in rank order: score descending, then doc id ascending.
    pub hits: Vec<SearchHit>,

    /// Number of matches across all pages.
    pub total_hits: usize,

    /// Whether at least one match lies beyond this page.
    pub has_more: bool,
}

impl SearchResults {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Doc ids of this page, in rank order.
    pub fn ids(&self) -> Vec<String> {
        self.hits.iter().map(|hit| hit.doc_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Executes parsed queries against one snapshot.
///
/// Ranking is a BM25 sum over the distinct matched terms, so a document
/// scores higher with more occurrences of a term, with rarer terms, and with
/// more distinct query terms. Iteration is over ordered maps only and ties
/// fall back to ascending doc id, so the ranked list is identical on every
/// call against the same snapshot and pages never overlap or skip.
#[derive(Debug)]
pub struct Searcher<'a> {
    snapshot: &'a ReadSnapshot,
    bm25: Bm25,
    max_prefix_expansions: usize,
}

impl<'a> Searcher<'a> {
    pub fn new(snapshot: &'a ReadSnapshot, params: Bm25Params, max_prefix_expansions: usize) -> Self {
        Searcher {
            snapshot,
            bm25: Bm25::new(params, snapshot.doc_count(), snapshot.average_length()),
            max_prefix_expansions,
        }
    }

    /// Return matches `[offset, offset + limit)` of the ranked list.
    pub fn search(&self, query: &ParsedQuery, offset: usize, limit: usize) -> SearchResults {
        let ranked = self.rank(query);
        let total_hits = ranked.len();
        let hits: Vec<SearchHit> = ranked.into_iter().skip(offset).take(limit).collect();
        let has_more = total_hits > offset.saturating_add(hits.len());
        SearchResults {
            hits,
            total_hits,
            has_more,
        }
    }

    /// Every matching document, in rank order.
    pub fn rank(&self, query: &ParsedQuery) -> Vec<SearchHit> {
        if !query.has_positive_clause() || self.snapshot.is_empty() {
            return Vec::new();
        }

        let mut scoring_terms: BTreeMap<&str, &PostingList> = BTreeMap::new();
        let mut required: Vec<BTreeSet<&str>> = Vec::new();
        let mut excluded: BTreeSet<&str> = BTreeSet::new();

        for clause in query.clauses() {
            let lists = self.expand(&clause.term);
            match clause.occur {
                Occur::Should => scoring_terms.extend(lists),
                Occur::Must => {
                    let docs: BTreeSet<&str> = lists
                        .iter()
                        .flat_map(|&(_, list)| list.iter().map(|(id, _)| id))
                        .collect();
                    if docs.is_empty() {
                        return Vec::new();
                    }
                    required.push(docs);
                    scoring_terms.extend(lists);
                }
                Occur::MustNot => {
                    for (_, list) in lists {
                        excluded.extend(list.iter().map(|(id, _)| id));
                    }
                }
            }
        }

        let mut scores: BTreeMap<&str, f32> = BTreeMap::new();
        for list in scoring_terms.values() {
            let idf = self.bm25.idf(list.len());
            for (doc_id, tf) in list.iter() {
                if excluded.contains(doc_id) || !required.iter().all(|set| set.contains(doc_id)) {
                    continue;
                }
                let length = self
                    .snapshot
                    .document(doc_id)
                    .map(|doc| doc.length)
                    .unwrap_or(0);
                *scores.entry(doc_id).or_insert(0.0) += self.bm25.score(tf, length, idf);
            }
        }

        let mut hits: Vec<SearchHit> = scores
            .into_iter()
            .map(|(doc_id, score)| SearchHit {
                doc_id: doc_id.to_string(),
                score,
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        hits
    }

    /// Resolve a clause to the posting lists of the terms it matches.
    fn expand<'q>(&'q self, term: &'q TermMatch) -> Vec<(&'q str, &'q PostingList)> {
        match term {
            TermMatch::Exact(text) => self
                .snapshot
                .postings(text)
                .map(|list| (text.as_str(), list))
                .into_iter()
                .collect(),
            TermMatch::Prefix(prefix) => self
                .snapshot
                .terms_with_prefix(prefix)
                .take(self.max_prefix_expansions)
                .collect(),
        }
    }
}
