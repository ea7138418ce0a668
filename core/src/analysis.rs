//! Inverted index over one scope and the queries it answers.
//!
//! An [`Analysis`] is built in a single pass from the scope's documents and
//! its [`IndexConfig`]. It is never updated afterwards; rebuild it when the
//! documents or the configuration change.

use crate::config::IndexConfig;
use crate::highlight;
use crate::spread::Spread;
use crate::store::{DocumentSource, IndexConfigSource};
use crate::tokenizer::tokenize;
use crate::{DocId, Document};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermEntry {
    /// Total weighted occurrences across every document.
    pub sum: u64,
    pub spread: Spread,
}

/// A selection of terms, as returned by [`Analysis::filter`].
pub type TermMap<'a> = BTreeMap<&'a str, &'a TermEntry>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Analysis {
    terms: BTreeMap<String, TermEntry>,
}

/// Build the analysis for `scope`, or `None` if the scope has no text index.
pub fn build<S>(source: &S, scope: &str) -> Option<Analysis>
where
    S: DocumentSource + IndexConfigSource + ?Sized,
{
    let config = source.index_config(scope)?;
    let docs = source.enumerate(scope);
    let analysis = Analysis::build(&docs, &config);
    tracing::debug!(scope, docs = docs.len(), terms = analysis.len(), "built text analysis");
    Some(analysis)
}

impl Analysis {
    /// Index `docs` (in the order given) under `config`.
    pub fn build<'a, I>(docs: I, config: &IndexConfig) -> Analysis
    where
        I: IntoIterator<Item = &'a Document>,
    {
        // term -> (document position, weighted count), in document order
        let mut postings: HashMap<&'a str, Vec<(usize, u32)>> = HashMap::new();
        let mut ids: Vec<&'a str> = Vec::new();

        for doc in docs {
            let pos = ids.len();
            ids.push(doc.id.as_str());

            let mut counts: HashMap<&'a str, u32> = HashMap::new();
            for (field, weight) in config.fields() {
                let Some(text) = doc.text(field) else { continue };
                for token in tokenize(text) {
                    let count = counts.entry(token).or_insert(0);
                    *count = count.saturating_add(weight);
                }
            }
            for (term, count) in counts {
                postings.entry(term).or_default().push((pos, count));
            }
        }

        let terms = postings
            .into_iter()
            .map(|(term, plist)| {
                let mut entry = TermEntry::default();
                for (pos, count) in plist {
                    entry.sum += count as u64;
                    entry.spread.push(count, ids[pos].to_string());
                }
                (term.to_string(), entry)
            })
            .collect();
        Analysis { terms }
    }

    /// Every indexed term, in lexicographic order.
    pub fn terms(&self) -> Vec<&str> {
        self.terms.keys().map(String::as_str).collect()
    }

    pub fn entry(&self, term: &str) -> Option<&TermEntry> {
        self.terms.get(term)
    }

    /// Distinct weighted counts for `term`, highest first.
    pub fn scores(&self, term: &str) -> Vec<u32> {
        self.entry(term).map(|e| e.spread.scores()).unwrap_or_default()
    }

    /// The document with the highest count for `term`; earliest inserted wins ties.
    pub fn top(&self, term: &str) -> Option<&str> {
        self.entry(term).and_then(|e| e.spread.top())
    }

    /// Every document containing `term`, lowest count first, insertion order within a count.
    pub fn all(&self, term: &str) -> Vec<&str> {
        self.entry(term).map(|e| e.spread.all()).unwrap_or_default()
    }

    /// Terms accepted by `predicate`. An invalid predicate selects nothing.
    pub fn filter(&self, predicate: &TermPredicate<'_>) -> TermMap<'_> {
        match predicate {
            TermPredicate::Matcher(f) => self
                .terms
                .iter()
                .filter(|(term, _)| f(term.as_str()))
                .map(|(term, entry)| (term.as_str(), entry))
                .collect(),
            TermPredicate::Invalid(expr) => {
                tracing::debug!(%expr, "filter with invalid predicate");
                TermMap::new()
            }
        }
    }

    pub fn filter_by<F>(&self, f: F) -> TermMap<'_>
    where
        F: Fn(&str) -> bool + Send + Sync,
    {
        self.filter(&TermPredicate::matcher(f))
    }

    /// Distinct document ids referenced by `terms`, in first-seen order,
    /// ready for a batch fetch.
    pub fn serialize(&self, terms: &TermMap<'_>) -> Vec<DocId> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        for entry in terms.values() {
            for (_, chain) in entry.spread.iter() {
                for doc in chain {
                    if seen.insert(doc) {
                        out.push(doc.to_string());
                    }
                }
            }
        }
        out
    }

    /// See [`highlight::highlight`].
    pub fn highlight(&self, term: &str, text: &str, template: &str) -> String {
        highlight::highlight(term, text, template)
    }

    /// The whole index: term → entry.
    pub fn dump(&self) -> &BTreeMap<String, TermEntry> {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Argument to [`Analysis::filter`].
///
/// Callers at a text boundary (CLI, HTTP) may hand over something that is not
/// a usable matcher; that arrives as `Invalid` and filters to an empty map
/// instead of failing the request.
pub enum TermPredicate<'a> {
    Matcher(Box<dyn Fn(&str) -> bool + Send + Sync + 'a>),
    Invalid(String),
}

impl<'a> TermPredicate<'a> {
    pub fn matcher<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'a,
    {
        TermPredicate::Matcher(Box::new(f))
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, TermPredicate::Matcher(_))
    }
}

impl TermPredicate<'static> {
    /// Parse `kind:arg` where kind is one of `prefix`, `suffix`, `exact`,
    /// `contains` or `regex`. Anything else is `Invalid`.
    pub fn parse(expr: &str) -> Self {
        let Some((kind, arg)) = expr.split_once(':') else {
            return TermPredicate::Invalid(expr.to_string());
        };
        let arg = arg.to_string();
        match kind {
            "prefix" => Self::matcher(move |t: &str| t.starts_with(arg.as_str())),
            "suffix" => Self::matcher(move |t: &str| t.ends_with(arg.as_str())),
            "exact" => Self::matcher(move |t: &str| t == arg),
            "contains" => Self::matcher(move |t: &str| t.contains(arg.as_str())),
            "regex" => match Regex::new(&arg) {
                Ok(re) => Self::matcher(move |t: &str| re.is_match(t)),
                Err(_) => TermPredicate::Invalid(expr.to_string()),
            },
            _ => TermPredicate::Invalid(expr.to_string()),
        }
    }
}

impl fmt::Debug for TermPredicate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermPredicate::Matcher(_) => f.write_str("Matcher(..)"),
            TermPredicate::Invalid(expr) => f.debug_tuple("Invalid").field(expr).finish(),
        }
    }
}
