//! Frequency buckets for a single term.
//!
//! Documents are grouped by their weighted count for the term. Each bucket
//! is a singly linked chain of nodes living in one arena; a bucket stores the
//! index of its head and tail so appends stay O(1) and keep insertion order.

use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Node {
    doc: DocId,
    next: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Chain {
    head: usize,
    tail: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(into = "BTreeMap<u32, Vec<DocId>>", from = "BTreeMap<u32, Vec<DocId>>")]
pub struct Spread {
    buckets: BTreeMap<u32, Chain>,
    nodes: Vec<Node>,
}

impl Spread {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `doc` to the tail of the chain for `count`.
    pub fn push(&mut self, count: u32, doc: DocId) {
        let idx = self.nodes.len();
        self.nodes.push(Node { doc, next: None });
        match self.buckets.get_mut(&count) {
            Some(chain) => {
                self.nodes[chain.tail].next = Some(idx);
                chain.tail = idx;
            }
            None => {
                self.buckets.insert(count, Chain { head: idx, tail: idx });
            }
        }
    }

    /// Distinct counts, highest first.
    pub fn scores(&self) -> Vec<u32> {
        self.buckets.keys().rev().copied().collect()
    }

    /// Head of the highest bucket: the earliest document among those with
    /// the maximum count.
    pub fn top(&self) -> Option<&str> {
        self.buckets
            .values()
            .next_back()
            .map(|chain| self.nodes[chain.head].doc.as_str())
    }

    /// Every document, buckets ascending by count, each chain head to tail.
    pub fn all(&self) -> Vec<&str> {
        self.iter().flat_map(|(_, chain)| chain).collect()
    }

    /// Documents with exactly `count`, in chain order.
    pub fn chain(&self, count: u32) -> ChainIter<'_> {
        ChainIter {
            nodes: &self.nodes,
            cursor: self.buckets.get(&count).map(|c| c.head),
        }
    }

    /// Buckets in ascending count order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, ChainIter<'_>)> + '_ {
        self.buckets.iter().map(move |(count, chain)| {
            (*count, ChainIter { nodes: &self.nodes, cursor: Some(chain.head) })
        })
    }

    /// Σ count × chain length.
    pub fn weighted_total(&self) -> u64 {
        self.iter()
            .map(|(count, chain)| count as u64 * chain.count() as u64)
            .sum()
    }

    /// Number of documents across all buckets.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

// Arena layout depends on push order; equality is over bucket contents.
impl PartialEq for Spread {
    fn eq(&self, other: &Self) -> bool {
        self.bucket_count() == other.bucket_count()
            && self
                .iter()
                .zip(other.iter())
                .all(|((a, chain_a), (b, chain_b))| a == b && chain_a.eq(chain_b))
    }
}

/// Walks one chain from head to tail.
#[derive(Clone)]
pub struct ChainIter<'a> {
    nodes: &'a [Node],
    cursor: Option<usize>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let node = &self.nodes[self.cursor?];
        self.cursor = node.next;
        Some(node.doc.as_str())
    }
}

impl From<BTreeMap<u32, Vec<DocId>>> for Spread {
    fn from(map: BTreeMap<u32, Vec<DocId>>) -> Self {
        let mut spread = Spread::new();
        for (count, docs) in map {
            for doc in docs {
                spread.push(count, doc);
            }
        }
        spread
    }
}

impl From<Spread> for BTreeMap<u32, Vec<DocId>> {
    fn from(spread: Spread) -> Self {
        spread
            .iter()
            .map(|(count, chain)| (count, chain.map(str::to_string).collect()))
            .collect()
    }
}
