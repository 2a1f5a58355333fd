use std::cmp::Ordering;

use super::document::{Document, Value};
use super::path::CollectionPath;

/// Comparison operator of a field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.get(&self.field) else {
            return false;
        };
        let ord = actual.compare(&self.value);
        match self.op {
            FilterOp::Eq => ord == Ordering::Equal,
            FilterOp::Gte => ord != Ordering::Less,
            FilterOp::Lte => ord != Ordering::Greater,
        }
    }
}

/// A query over the direct documents of one collection.
/// Filters are conjunctive: a document must satisfy all of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: CollectionPath,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
}

impl Query {
    pub fn new(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: None,
        }
    }

    pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    /// Filter and order a set of candidate documents.
    ///
    /// Documents lacking the order field are excluded, which is how the
    /// managed store treats `orderBy` on a missing field.
    pub fn apply<'a>(&self, docs: impl IntoIterator<Item = &'a Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs
            .into_iter()
            .filter(|d| self.matches(d))
            .filter(|d| match &self.order_by {
                Some((field, _)) => d.get(field).is_some(),
                None => true,
            })
            .cloned()
            .collect();

        if let Some((field, direction)) = &self.order_by {
            out.sort_by(|a, b| {
                let ord = match (a.get(field), b.get(field)) {
                    (Some(x), Some(y)) => x.compare(y),
                    _ => Ordering::Equal,
                };
                // Stable tiebreak on id keeps snapshots deterministic.
                let ord = ord.then_with(|| a.id.cmp(&b.id));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        out
    }
}
