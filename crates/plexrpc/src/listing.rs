//! # Procedure Listings
//!
//! The arity-only wire description of a procedure tree, sent once per
//! negotiated connection. A listing has the exact shape of the tree it
//! describes, with every callable leaf replaced by its declared arity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One entry in a listing: a callable leaf's declared arity, or a nested
/// namespace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListingNode {
    Arity(usize),
    Scope(Listing),
}

/// A nested mapping from procedure name to arity or sub-listing.
///
/// Serializes to the compact JSON a peer transmits in its `init`
/// response, e.g. `{"add":2,"foo":{"bar":0}}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Listing {
    entries: BTreeMap<String, ListingNode>,
}

impl Listing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, node: ListingNode) {
        self.entries.insert(name.into(), node);
    }

    pub fn get(&self, name: &str) -> Option<&ListingNode> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &ListingNode)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the listing as its wire JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a listing from its wire JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Flattens the listing into (dot-path, arity) pairs, leaves only.
    ///
    /// Paths come out in lexicographic order within each namespace.
    pub fn paths(&self) -> Vec<(String, usize)> {
        let mut out = Vec::new();
        self.collect_paths(None, &mut out);
        out
    }

    fn collect_paths(&self, prefix: Option<&str>, out: &mut Vec<(String, usize)>) {
        for (name, node) in &self.entries {
            let path = match prefix {
                Some(prefix) => format!("{}.{}", prefix, name),
                None => name.clone(),
            };
            match node {
                ListingNode::Arity(arity) => out.push((path, *arity)),
                ListingNode::Scope(sub) => sub.collect_paths(Some(&path), out),
            }
        }
    }
}
