//! Combine Graph
//!
//! Tracks which page indices were merged into which surviving index. A
//! survivor may later be absorbed by another page, in which case its own
//! absorption list travels with it as a nested group, so no earlier merge
//! is ever lost.
//!
//! ```text
//! combine(4,5) horizontal, combine(6,7) horizontal, combine(4,6) vertical
//!
//!   3 ── 4 (horizontal)
//!   └─── [5 ── 6 (horizontal)] (vertical)        (0-based indices)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Combine graph error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CombineError {
    #[error("Page index {0} cannot be combined with itself")]
    SelfCombine(usize),

    #[error("Page index {index} was already combined into page index {survivor}")]
    AlreadyAbsorbed { index: usize, survivor: usize },
}

/// Layout direction of a combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Side by side, left to right
    #[default]
    Horizontal,
    /// Stacked, top to bottom
    Vertical,
}

impl Direction {
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Horizontal => "horizontal",
            Direction::Vertical => "vertical",
        }
    }

    /// Adverb form for log messages
    pub fn adverb(&self) -> &'static str {
        match self {
            Direction::Horizontal => "horizontally",
            Direction::Vertical => "vertically",
        }
    }

    /// Where the image laid out first ends up
    pub fn leading_side(&self) -> &'static str {
        match self {
            Direction::Horizontal => "on the left",
            Direction::Vertical => "on top",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Something a survivor absorbed: a plain page or a former survivor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombineChild {
    Page(usize),
    Group(CombineNode),
}

impl CombineChild {
    /// Index of the page (or group survivor) that was absorbed
    pub fn index(&self) -> usize {
        match self {
            CombineChild::Page(index) => *index,
            CombineChild::Group(node) => node.index,
        }
    }
}

/// A surviving page and everything it absorbed, in merge order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombineNode {
    pub index: usize,
    pub absorbed: Vec<(CombineChild, Direction)>,
    /// Absorbed children laid out before the survivor's image
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub leading: BTreeSet<usize>,
}

impl CombineNode {
    fn new(index: usize) -> Self {
        Self {
            index,
            absorbed: Vec::new(),
            leading: BTreeSet::new(),
        }
    }

    /// Every page index in this subtree, survivor first, depth first
    pub fn pages(&self) -> Vec<usize> {
        let mut pages = vec![self.index];
        for (child, _) in &self.absorbed {
            match child {
                CombineChild::Page(index) => pages.push(*index),
                CombineChild::Group(node) => pages.extend(node.pages()),
            }
        }
        pages
    }

    /// Human-readable description with 1-based page numbers
    pub fn describe(&self) -> String {
        let parts: Vec<String> = self
            .absorbed
            .iter()
            .map(|(child, direction)| {
                let part = match child {
                    CombineChild::Page(index) => {
                        format!("page {} {}", index + 1, direction.adverb())
                    }
                    CombineChild::Group(node) => {
                        format!("({}) {}", node.describe(), direction.adverb())
                    }
                };
                if self.leading.contains(&child.index()) {
                    format!(
                        "{} (page {} {})",
                        part,
                        child.index() + 1,
                        direction.leading_side()
                    )
                } else {
                    part
                }
            })
            .collect();

        if parts.is_empty() {
            format!("page {}", self.index + 1)
        } else {
            format!("page {} combined with {}", self.index + 1, parts.join(", "))
        }
    }
}

/// Losing → surviving index chains plus each survivor's absorption tree
#[derive(Debug, Clone, Default)]
pub struct CombineGraph {
    absorbed_by: BTreeMap<usize, usize>,
    nodes: BTreeMap<usize, CombineNode>,
}

impl CombineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `survivor` absorbed `absorbed`, laid out after it.
    ///
    /// Both indices must still be live. If `absorbed` had absorbed pages of
    /// its own, that whole subtree is nested under the survivor.
    pub fn absorb(
        &mut self,
        survivor: usize,
        absorbed: usize,
        direction: Direction,
    ) -> Result<(), CombineError> {
        self.absorb_placed(survivor, absorbed, direction, false)
    }

    /// Like [`CombineGraph::absorb`], with `absorbed_first` set when the
    /// absorbed image was laid out before the survivor's
    pub fn absorb_placed(
        &mut self,
        survivor: usize,
        absorbed: usize,
        direction: Direction,
        absorbed_first: bool,
    ) -> Result<(), CombineError> {
        if survivor == absorbed {
            return Err(CombineError::SelfCombine(survivor));
        }
        for index in [survivor, absorbed] {
            if let Some(&by) = self.absorbed_by.get(&index) {
                return Err(CombineError::AlreadyAbsorbed {
                    index,
                    survivor: self.resolve_survivor(by),
                });
            }
        }

        let child = match self.nodes.remove(&absorbed) {
            Some(node) => CombineChild::Group(node),
            None => CombineChild::Page(absorbed),
        };
        let node = self
            .nodes
            .entry(survivor)
            .or_insert_with(|| CombineNode::new(survivor));
        node.absorbed.push((child, direction));
        if absorbed_first {
            node.leading.insert(absorbed);
        }
        self.absorbed_by.insert(absorbed, survivor);

        Ok(())
    }

    /// Follow the absorption chain from `index` to the page holding its image
    pub fn resolve_survivor(&self, index: usize) -> usize {
        let mut current = index;
        while let Some(&next) = self.absorbed_by.get(&current) {
            current = next;
        }
        current
    }

    /// Whether `index` was absorbed into another page
    pub fn is_absorbed(&self, index: usize) -> bool {
        self.absorbed_by.contains_key(&index)
    }

    /// The absorption tree of a live survivor
    pub fn node(&self, index: usize) -> Option<&CombineNode> {
        self.nodes.get(&index)
    }

    /// Label listing every page merged into `index`, e.g. `4-5`
    pub fn label(&self, index: usize) -> String {
        match self.nodes.get(&index) {
            Some(node) => node
                .pages()
                .iter()
                .map(|p| (p + 1).to_string())
                .collect::<Vec<_>>()
                .join("-"),
            None => (index + 1).to_string(),
        }
    }

    /// Human-readable description of a page's combine provenance
    pub fn describe(&self, index: usize) -> String {
        if self.is_absorbed(index) {
            let survivor = self.resolve_survivor(index);
            return format!(
                "page {} combined into page {}",
                index + 1,
                survivor + 1
            );
        }
        match self.nodes.get(&index) {
            Some(node) => node.describe(),
            None => format!("page {}", index + 1),
        }
    }

    /// Whether no combines have been recorded
    pub fn is_empty(&self) -> bool {
        self.absorbed_by.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_absorb() {
        let mut graph = CombineGraph::new();
        graph.absorb(3, 4, Direction::Horizontal).unwrap();

        assert!(graph.is_absorbed(4));
        assert!(graph.node(3).is_some());
        assert_eq!(graph.resolve_survivor(4), 3);
        assert_eq!(graph.resolve_survivor(3), 3);
        assert_eq!(graph.label(3), "4-5");
        assert_eq!(graph.describe(3), "page 4 combined with page 5 horizontally");
        assert_eq!(graph.describe(4), "page 5 combined into page 4");
    }

    #[test]
    fn test_second_absorb_keeps_first() {
        let mut graph = CombineGraph::new();
        graph.absorb(0, 1, Direction::Horizontal).unwrap();
        graph.absorb(0, 2, Direction::Vertical).unwrap();

        let description = graph.describe(0);
        assert!(description.contains("page 2"));
        assert!(description.contains("page 3"));
        assert_eq!(
            description,
            "page 1 combined with page 2 horizontally, page 3 vertically"
        );
    }

    #[test]
    fn test_survivor_absorbed_nests_group() {
        // Box layout: (4,5) (6,7) then (4,6)
        let mut graph = CombineGraph::new();
        graph.absorb(3, 4, Direction::Horizontal).unwrap();
        graph.absorb(5, 6, Direction::Horizontal).unwrap();
        graph.absorb(3, 5, Direction::Vertical).unwrap();

        assert_eq!(graph.resolve_survivor(6), 3);
        assert_eq!(graph.resolve_survivor(5), 3);
        assert!(graph.node(5).is_none());
        assert_eq!(graph.label(3), "4-5-6-7");

        let node = graph.node(3).unwrap();
        assert_eq!(node.absorbed.len(), 2);
        match &node.absorbed[1] {
            (CombineChild::Group(group), Direction::Vertical) => {
                assert_eq!(group.index, 5);
                assert_eq!(group.absorbed, vec![(CombineChild::Page(6), Direction::Horizontal)]);
            }
            other => panic!("unexpected child {:?}", other),
        }

        assert_eq!(
            graph.describe(3),
            "page 4 combined with page 5 horizontally, \
             (page 6 combined with page 7 horizontally) vertically"
        );
    }

    #[test]
    fn test_deep_chain_resolves() {
        let mut graph = CombineGraph::new();
        graph.absorb(4, 5, Direction::Horizontal).unwrap();
        graph.absorb(3, 4, Direction::Horizontal).unwrap();
        graph.absorb(2, 3, Direction::Horizontal).unwrap();
        graph.absorb(1, 2, Direction::Vertical).unwrap();

        assert_eq!(graph.resolve_survivor(5), 1);
        assert_eq!(graph.label(1), "2-3-4-5-6");
    }

    #[test]
    fn test_absorb_errors() {
        let mut graph = CombineGraph::new();
        assert_eq!(
            graph.absorb(2, 2, Direction::Horizontal),
            Err(CombineError::SelfCombine(2))
        );

        graph.absorb(0, 1, Direction::Horizontal).unwrap();
        assert_eq!(
            graph.absorb(1, 2, Direction::Horizontal),
            Err(CombineError::AlreadyAbsorbed {
                index: 1,
                survivor: 0
            })
        );
        assert_eq!(
            graph.absorb(2, 1, Direction::Horizontal),
            Err(CombineError::AlreadyAbsorbed {
                index: 1,
                survivor: 0
            })
        );
    }

    #[test]
    fn test_absorbed_page_laid_out_first() {
        // combine(5,4): page 5's image comes first, page 4 still survives
        let mut graph = CombineGraph::new();
        graph.absorb_placed(3, 4, Direction::Horizontal, true).unwrap();

        assert_eq!(graph.resolve_survivor(4), 3);
        assert_eq!(graph.label(3), "4-5");
        assert_eq!(
            graph.describe(3),
            "page 4 combined with page 5 horizontally (page 5 on the left)"
        );
        assert_eq!(graph.node(3).unwrap().leading, BTreeSet::from([4]));

        let mut graph = CombineGraph::new();
        graph.absorb_placed(0, 1, Direction::Vertical, true).unwrap();
        assert!(graph.describe(0).ends_with("(page 2 on top)"));
    }

    #[test]
    fn test_uncombined_page() {
        let graph = CombineGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.label(7), "8");
        assert_eq!(graph.describe(7), "page 8");
        assert_eq!(graph.resolve_survivor(7), 7);
    }
}
