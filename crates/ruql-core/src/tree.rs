//! Resource tree
//!
//! Dotted resource ids imply a folder hierarchy (`platform.login.title`
//! lives in folder `platform.login`). The tree is an arena of id-indexed
//! nodes with string-path lookup; nodes refer to each other by index, never
//! by nested pointers.

use std::collections::HashMap;

use serde::Serialize;

use crate::resource::ResourceId;

/// Index of a node within the tree arena
pub type NodeIndex = usize;

/// What a tree node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeNodeKind {
    /// An implied folder (id prefix with no declaration of its own)
    Folder,
    /// A declared resource
    Resource,
}

/// One node in the resource tree
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    /// Full dotted path of this node
    pub path: String,
    /// Final path segment
    pub name: String,
    /// Folder or resource
    pub kind: TreeNodeKind,
    /// Arena index of the parent folder, if any
    pub parent: Option<NodeIndex>,
    /// Arena indices of children, sorted by name
    pub children: Vec<NodeIndex>,
}

/// Arena-backed tree over a set of resource ids
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceTree {
    nodes: Vec<TreeNode>,
    #[serde(skip)]
    index: HashMap<String, NodeIndex>,
    roots: Vec<NodeIndex>,
}

impl ResourceTree {
    /// Build a tree from resource ids
    ///
    /// Every dotted prefix of an id becomes a folder node unless a resource
    /// is declared at that exact path. Ids must arrive in sorted order for
    /// deterministic child ordering; the manager's BTreeMap guarantees this.
    pub fn build<'a, I>(ids: I) -> Self
    where
        I: IntoIterator<Item = &'a ResourceId>,
    {
        let mut tree = ResourceTree::default();
        for id in ids {
            tree.insert(id);
        }
        tree
    }

    fn insert(&mut self, id: &ResourceId) {
        let mut parent: Option<NodeIndex> = None;
        let mut path = String::new();
        let segments: Vec<&str> = id.segments().collect();

        for (depth, segment) in segments.iter().enumerate() {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(segment);
            let is_leaf = depth + 1 == segments.len();

            let node_idx = match self.index.get(&path) {
                Some(&idx) => {
                    // A resource declared at a prefix of another id stays a
                    // resource node; children still attach beneath it.
                    if is_leaf {
                        self.nodes[idx].kind = TreeNodeKind::Resource;
                    }
                    idx
                }
                None => {
                    let idx = self.nodes.len();
                    self.nodes.push(TreeNode {
                        path: path.clone(),
                        name: segment.to_string(),
                        kind: if is_leaf {
                            TreeNodeKind::Resource
                        } else {
                            TreeNodeKind::Folder
                        },
                        parent,
                        children: Vec::new(),
                    });
                    self.index.insert(path.clone(), idx);
                    match parent {
                        Some(p) => self.nodes[p].children.push(idx),
                        None => self.roots.push(idx),
                    }
                    idx
                }
            };

            parent = Some(node_idx);
        }
    }

    /// Look up a node by its full dotted path
    pub fn lookup(&self, path: &str) -> Option<&TreeNode> {
        self.index.get(path).map(|&idx| &self.nodes[idx])
    }

    /// Node by arena index
    pub fn node(&self, idx: NodeIndex) -> &TreeNode {
        &self.nodes[idx]
    }

    /// Arena indices of top-level nodes
    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    /// Total node count (folders + resources)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first walk yielding (depth, node) pairs in display order
    pub fn walk(&self) -> Vec<(usize, &TreeNode)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, NodeIndex)> =
            self.roots.iter().rev().map(|&idx| (0, idx)).collect();
        while let Some((depth, idx)) = stack.pop() {
            let node = &self.nodes[idx];
            out.push((depth, node));
            for &child in node.children.iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        out
    }
}
