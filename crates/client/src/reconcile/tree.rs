// Local page hierarchy: pages nest arbitrarily via parent_id.
//
// Inserts attach to the parent wherever it sits in the tree, falling back
// to the root level when the parent is not known locally (never silently
// dropped). Removal takes the whole subtree at whatever depth it occupies.

use cahier_common::protocol::event::PagePatch;
use cahier_common::types::Page;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageNode {
    pub page: Page,
    pub children: Vec<PageNode>,
}

impl PageNode {
    fn new(page: Page) -> Self {
        Self { page, children: Vec::new() }
    }

    fn contains(&self, id: Uuid) -> bool {
        self.page.id == id || self.children.iter().any(|child| child.contains(id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageTree {
    roots: Vec<PageNode>,
}

impl PageTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total page count across all nesting levels.
    pub fn len(&self) -> usize {
        fn count(node: &PageNode) -> usize {
            1 + node.children.iter().map(count).sum::<usize>()
        }
        self.roots.iter().map(count).sum()
    }

    pub fn roots(&self) -> &[PageNode] {
        &self.roots
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.roots.iter().any(|node| node.contains(id))
    }

    pub fn get(&self, id: Uuid) -> Option<&Page> {
        fn find(node: &PageNode, id: Uuid) -> Option<&Page> {
            if node.page.id == id {
                return Some(&node.page);
            }
            node.children.iter().find_map(|child| find(child, id))
        }
        self.roots.iter().find_map(|node| find(node, id))
    }

    /// Insert a page, attaching under its parent if that parent exists
    /// anywhere in the tree, otherwise at the root level. Returns false
    /// without modification when the id is already present.
    pub fn insert(&mut self, page: Page) -> bool {
        if self.contains(page.id) {
            return false;
        }
        let node = PageNode::new(page);
        match node.page.parent_id.and_then(|parent_id| Self::find_node_mut(&mut self.roots, parent_id))
        {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
        true
    }

    /// Remove a page and its entire subtree, at any nesting depth.
    pub fn remove(&mut self, id: Uuid) -> Option<PageNode> {
        Self::remove_from(&mut self.roots, id)
    }

    /// Merge a patch onto an existing page. A `parent_id` change moves the
    /// whole subtree under the new parent; when the new parent is unknown
    /// (or sits inside the moved subtree) the subtree lands at the root.
    pub fn apply_patch(&mut self, id: Uuid, patch: &PagePatch) -> bool {
        let Some(node) = Self::find_node_mut(&mut self.roots, id) else {
            return false;
        };

        if let Some(title) = &patch.title {
            node.page.title = title.clone();
        }
        if let Some(icon) = &patch.icon {
            node.page.icon = Some(icon.clone());
        }
        if let Some(position) = patch.position {
            node.page.position = position;
        }

        if let Some(new_parent) = patch.parent_id {
            if node.page.parent_id != Some(new_parent) && id != new_parent {
                if let Some(mut detached) = self.remove(id) {
                    detached.page.parent_id = Some(new_parent);
                    match Self::find_node_mut(&mut self.roots, new_parent) {
                        Some(parent) => parent.children.push(detached),
                        None => self.roots.push(detached),
                    }
                }
            }
        }

        true
    }

    /// Depth-first flattening of the tree.
    pub fn flatten(&self) -> Vec<&Page> {
        fn walk<'a>(node: &'a PageNode, out: &mut Vec<&'a Page>) {
            out.push(&node.page);
            for child in &node.children {
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        for node in &self.roots {
            walk(node, &mut out);
        }
        out
    }

    fn find_node_mut(nodes: &mut Vec<PageNode>, id: Uuid) -> Option<&mut PageNode> {
        for node in nodes {
            if node.page.id == id {
                return Some(node);
            }
            if let Some(found) = Self::find_node_mut(&mut node.children, id) {
                return Some(found);
            }
        }
        None
    }

    fn remove_from(nodes: &mut Vec<PageNode>, id: Uuid) -> Option<PageNode> {
        if let Some(index) = nodes.iter().position(|node| node.page.id == id) {
            return Some(nodes.remove(index));
        }
        for node in nodes {
            if let Some(removed) = Self::remove_from(&mut node.children, id) {
                return Some(removed);
            }
        }
        None
    }
}
