//! Batched cursor over query results.

use std::collections::VecDeque;

use super::document::Document;

const DEFAULT_BATCH_SIZE: usize = 101;

/// Iterator over found documents, handed out in batches.
#[derive(Debug, Clone)]
pub struct Cursor {
    docs: VecDeque<Document>,
    batch_size: usize,
}

impl Cursor {
    pub fn new(docs: Vec<Document>) -> Self {
        Self {
            docs: docs.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Next batch of at most `batch_size` documents; empty when drained.
    pub fn next_batch(&mut self) -> Vec<Document> {
        let n = self.batch_size.min(self.docs.len());
        self.docs.drain(..n).collect()
    }

    pub fn remaining(&self) -> usize {
        self.docs.len()
    }
}

impl Iterator for Cursor {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        self.docs.pop_front()
    }
}
