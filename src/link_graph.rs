//! Per-page link graphs: inline anchor text mapped to the page(s) it points to.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::types::{AnchorText, PageTitle};

/// Where an anchor text points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkTarget {
    /// Every occurrence of the anchor links to the same page.
    Resolved(PageTitle),
    /// The anchor links to several pages with no consensus.
    Ambiguous(BTreeSet<PageTitle>),
}

impl LinkTarget {
    /// Single target title, or `None` when the anchor is ambiguous.
    pub fn resolved(&self) -> Option<&str> {
        match self {
            LinkTarget::Resolved(title) => Some(title),
            LinkTarget::Ambiguous(_) => None,
        }
    }
}

/// Stored shape of a link-graph value: one title or a list of titles.
#[derive(Deserialize, Serialize)]
#[serde(untagged)]
enum StoredTarget {
    One(PageTitle),
    Many(Vec<PageTitle>),
}

impl StoredTarget {
    fn into_target(self) -> Option<LinkTarget> {
        match self {
            StoredTarget::One(title) => Some(LinkTarget::Resolved(title)),
            StoredTarget::Many(titles) => {
                let mut distinct: BTreeSet<PageTitle> = titles.into_iter().collect();
                match distinct.len() {
                    0 => None,
                    1 => distinct.pop_first().map(LinkTarget::Resolved),
                    _ => Some(LinkTarget::Ambiguous(distinct)),
                }
            }
        }
    }
}

/// Anchor-text to target mapping for one page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkGraph {
    links: HashMap<AnchorText, LinkTarget>,
}

impl LinkGraph {
    /// Empty graph (no anchors).
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the stored JSON object form (`{"anchor": "Title" | ["Title", ...]}`).
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: HashMap<AnchorText, StoredTarget> = serde_json::from_slice(bytes)?;
        Ok(raw
            .into_iter()
            .filter_map(|(anchor, stored)| stored.into_target().map(|target| (anchor, target)))
            .collect())
    }

    /// Encode back into the stored JSON object form.
    pub fn to_json_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        let raw: HashMap<&str, StoredTarget> = self
            .links
            .iter()
            .map(|(anchor, target)| {
                let stored = match target {
                    LinkTarget::Resolved(title) => StoredTarget::One(title.clone()),
                    LinkTarget::Ambiguous(titles) => {
                        StoredTarget::Many(titles.iter().cloned().collect())
                    }
                };
                (anchor.as_str(), stored)
            })
            .collect();
        serde_json::to_vec(&raw)
    }

    /// Add or replace the target of `anchor`.
    pub fn insert(&mut self, anchor: impl Into<AnchorText>, target: LinkTarget) {
        self.links.insert(anchor.into(), target);
    }

    /// Target of `anchor`, if the page links it.
    pub fn get(&self, anchor: &str) -> Option<&LinkTarget> {
        self.links.get(anchor)
    }

    /// Number of anchors.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns `true` when the page has no anchors.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl FromIterator<(AnchorText, LinkTarget)> for LinkGraph {
    fn from_iter<I: IntoIterator<Item = (AnchorText, LinkTarget)>>(iter: I) -> Self {
        Self {
            links: iter.into_iter().collect(),
        }
    }
}
