//! Category forest built as an index arena
//!
//! Nodes live in one `Vec`, linked by indices. Building the forest is a pure
//! lookup pass over the flat category rows; nothing is mutated while the tree
//! is walked.

use crate::catalog::CategoryMappingRow;
use serde::Serialize;
use std::collections::HashMap;

/// One category in the arena
#[derive(Debug, Clone)]
pub struct CategoryNode {
    pub id: String,
    pub name: String,
    pub parent_id: String,
    pub level: Option<i64>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Nested, serializable view of one forest node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTreeView {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CategoryTreeView>,
}

/// The category hierarchy as a forest of level-1 roots
#[derive(Debug, Clone, Default)]
pub struct CategoryForest {
    nodes: Vec<CategoryNode>,
    index: HashMap<String, usize>,
    roots: Vec<usize>,
    orphans: Vec<usize>,
}

impl CategoryForest {
    /// Builds the forest from `(id, name, parent_id, level)` rows
    ///
    /// Rows repeating an id already seen are ignored. A node whose parent is
    /// unknown becomes a root when it is level 1; otherwise it is logged and
    /// left out of the hierarchy. Siblings and roots are ordered by name.
    pub fn build<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, String, String, Option<i64>)>,
    {
        let mut forest = Self::default();

        for (id, name, parent_id, level) in rows {
            if id.is_empty() || forest.index.contains_key(&id) {
                continue;
            }
            forest.index.insert(id.clone(), forest.nodes.len());
            forest.nodes.push(CategoryNode {
                id,
                name,
                parent_id,
                level,
                parent: None,
                children: Vec::new(),
            });
        }

        for i in 0..forest.nodes.len() {
            let parent = forest
                .index
                .get(&forest.nodes[i].parent_id)
                .copied()
                .filter(|&p| p != i);

            match parent {
                Some(p) => {
                    forest.nodes[i].parent = Some(p);
                    forest.nodes[p].children.push(i);
                }
                None if forest.nodes[i].level == Some(1) => forest.roots.push(i),
                None => {
                    let node = &forest.nodes[i];
                    tracing::warn!(
                        "Category {} has parent '{}' which was not found and is not a level 1 category",
                        node.id,
                        node.parent_id
                    );
                    forest.orphans.push(i);
                }
            }
        }

        let nodes = &forest.nodes;
        let by_name = |a: &usize, b: &usize| nodes[*a].name.cmp(&nodes[*b].name);
        let mut sorted_children: Vec<Vec<usize>> = nodes
            .iter()
            .map(|n| {
                let mut c = n.children.clone();
                c.sort_by(by_name);
                c
            })
            .collect();
        forest.roots.sort_by(by_name);

        for (node, children) in forest.nodes.iter_mut().zip(sorted_children.drain(..)) {
            node.children = children;
        }

        forest
    }

    pub fn from_mapping(rows: &[CategoryMappingRow]) -> Self {
        Self::build(rows.iter().map(|r| {
            (
                r.category_id.clone(),
                r.category_name.clone(),
                r.category_parent_id.clone(),
                r.category_level.trim().parse::<f64>().ok().map(|l| l as i64),
            )
        }))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CategoryNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn roots(&self) -> impl Iterator<Item = &CategoryNode> {
        self.roots.iter().map(|&i| &self.nodes[i])
    }

    pub fn orphans(&self) -> impl Iterator<Item = &CategoryNode> {
        self.orphans.iter().map(|&i| &self.nodes[i])
    }

    pub fn children<'a>(
        &'a self,
        node: &'a CategoryNode,
    ) -> impl Iterator<Item = &'a CategoryNode> + 'a {
        node.children.iter().map(|&i| &self.nodes[i])
    }

    /// Ids from the root down to `id`, if `id` is reachable from a root
    pub fn path_to(&self, id: &str) -> Option<Vec<&str>> {
        let mut current = *self.index.get(id)?;
        let mut path = vec![self.nodes[current].id.as_str()];

        while let Some(parent) = self.nodes[current].parent {
            if path.len() > self.nodes.len() {
                return None;
            }
            current = parent;
            path.push(self.nodes[current].id.as_str());
        }

        if !self.roots.contains(&current) {
            return None;
        }

        path.reverse();
        Some(path)
    }

    /// Nested view of every root, for JSON output
    pub fn view(&self) -> Vec<CategoryTreeView> {
        self.roots.iter().map(|&i| self.view_node(i)).collect()
    }

    fn view_node(&self, i: usize) -> CategoryTreeView {
        let node = &self.nodes[i];
        CategoryTreeView {
            id: node.id.clone(),
            name: node.name.clone(),
            children: node.children.iter().map(|&c| self.view_node(c)).collect(),
        }
    }

    /// Renders the forest as an indented outline
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<(usize, usize)> = self.roots.iter().rev().map(|&r| (r, 0)).collect();

        while let Some((i, depth)) = stack.pop() {
            let node = &self.nodes[i];
            out.push_str(&"  ".repeat(depth));
            out.push_str(&format!("{} [{}]\n", node.name, node.id));
            for &child in node.children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }

        out
    }
}
