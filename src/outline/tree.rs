use std::cell::OnceCell;

use tracing::warn;

use crate::primitives::{PdfPrimitives, RawOutlineEntry, RawOutlineItem};

use super::ParseStats;

pub const ROOT_TITLE: &str = "Root";
pub const UNTITLED: &str = "(untitled)";

const MAX_OUTLINE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug)]
pub struct OutlineNode {
    pub title: String,
    /// 1-based start page; 0 when the destination could not be resolved.
    pub page_number: u32,
    pub level: Option<usize>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    pub(super) next_boundary_page: Option<u32>,
    pub(super) next_title: Option<String>,
    section_id: OnceCell<String>,
    pub(super) content: Option<String>,
}

impl OutlineNode {
    fn new(title: String, page_number: u32, level: Option<usize>, parent: Option<NodeId>) -> Self {
        Self {
            title,
            page_number,
            level,
            children: Vec::new(),
            parent,
            next_boundary_page: None,
            next_title: None,
            section_id: OnceCell::new(),
            content: None,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn next_boundary_page(&self) -> Option<u32> {
        self.next_boundary_page
    }

    pub fn next_title(&self) -> Option<&str> {
        self.next_title.as_deref()
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

#[derive(Debug)]
pub struct OutlineTree {
    nodes: Vec<OutlineNode>,
}

impl Default for OutlineTree {
    fn default() -> Self {
        Self::new()
    }
}

impl OutlineTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![OutlineNode::new(ROOT_TITLE.to_string(), 0, None, None)],
        }
    }

    pub fn build(
        items: &[RawOutlineItem],
        primitives: &dyn PdfPrimitives,
        stats: &mut ParseStats,
    ) -> Self {
        let mut tree = Self::new();
        let root = tree.root();
        tree.build_level(root, items, 0, primitives, stats);
        tree
    }

    fn build_level(
        &mut self,
        parent: NodeId,
        items: &[RawOutlineItem],
        depth: usize,
        primitives: &dyn PdfPrimitives,
        stats: &mut ParseStats,
    ) {
        let mut declaring: Option<NodeId> = None;

        for item in items {
            match item {
                RawOutlineItem::Entry(entry) => {
                    let title = entry_title(entry);
                    let page_number = resolve_entry_page(entry, &title, primitives, stats);
                    let id = self.add_child(parent, title, page_number);
                    stats.outline_entries += 1;
                    declaring = entry.declares_children().then_some(id);
                }
                RawOutlineItem::Children(children) => {
                    let Some(owner) = declaring.take() else {
                        warn!(
                            parent = %self.node(parent).title,
                            entries = children.len(),
                            "skipping outline child list with no declaring entry"
                        );
                        stats.orphan_child_lists += 1;
                        stats.warnings.push(format!(
                            "skipped orphan outline child list of {} entries under '{}'",
                            children.len(),
                            self.node(parent).title
                        ));
                        continue;
                    };

                    if depth + 1 >= MAX_OUTLINE_DEPTH {
                        warn!(
                            owner = %self.node(owner).title,
                            depth = depth + 1,
                            "skipping outline child list nested too deeply"
                        );
                        stats.warnings.push(format!(
                            "skipped outline child list under '{}' nested deeper than {} levels",
                            self.node(owner).title,
                            MAX_OUTLINE_DEPTH
                        ));
                        continue;
                    }

                    self.build_level(owner, children, depth + 1, primitives, stats);
                }
            }
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        id.0 == 0
    }

    pub fn is_empty(&self) -> bool {
        self.node(self.root()).children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn node(&self, id: NodeId) -> &OutlineNode {
        &self.nodes[id.0]
    }

    pub(super) fn node_mut(&mut self, id: NodeId) -> &mut OutlineNode {
        &mut self.nodes[id.0]
    }

    pub fn add_child(&mut self, parent: NodeId, title: impl Into<String>, page_number: u32) -> NodeId {
        let id = NodeId(self.nodes.len());
        let level = self.node(parent).level.map_or(0, |level| level + 1);
        self.nodes
            .push(OutlineNode::new(title.into(), page_number, Some(level), Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn preorder(&self) -> Vec<NodeId> {
        self.preorder_from(self.root())
            .into_iter()
            .filter(|id| !self.is_root(*id))
            .collect()
    }

    pub fn preorder_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        order
    }

    pub fn leaves(&self) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|id| self.node(*id).is_leaf())
            .collect()
    }

    pub fn sibling_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.node(id).parent?;
        self.node(parent).children.iter().position(|child| *child == id)
    }

    pub fn section_id(&self, id: NodeId) -> Option<&str> {
        let parent = self.node(id).parent?;
        let section_id = self.node(id).section_id.get_or_init(|| {
            let rank = self.sibling_index(id).map_or(1, |index| index + 1);
            match self.section_id(parent) {
                Some(parent_id) => format!("{parent_id}.{rank}"),
                None => rank.to_string(),
            }
        });
        Some(section_id.as_str())
    }

    pub fn section_path(&self, id: NodeId) -> Vec<String> {
        let mut path = Vec::new();
        let mut cursor = self.node(id).parent;
        while let Some(ancestor) = cursor {
            if self.is_root(ancestor) {
                break;
            }
            path.push(self.node(ancestor).title.clone());
            cursor = self.node(ancestor).parent;
        }
        path.reverse();
        path
    }

    pub fn find_by_section_id(&self, section_id: &str) -> Option<NodeId> {
        let mut cursor = self.root();
        for rank in section_id.split('.') {
            let rank = rank.parse::<usize>().ok().filter(|rank| *rank > 0)?;
            cursor = *self.node(cursor).children.get(rank - 1)?;
        }
        (!self.is_root(cursor)).then_some(cursor)
    }
}

fn entry_title(entry: &RawOutlineEntry) -> String {
    entry
        .title
        .as_deref()
        .map(|title| title.split_whitespace().collect::<Vec<&str>>().join(" "))
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

fn resolve_entry_page(
    entry: &RawOutlineEntry,
    title: &str,
    primitives: &dyn PdfPrimitives,
    stats: &mut ParseStats,
) -> u32 {
    let Some(destination) = &entry.destination else {
        warn!(title = %title, "outline entry has no destination");
        stats.unresolved_destinations += 1;
        stats
            .warnings
            .push(format!("outline entry '{title}' has no destination"));
        return 0;
    };

    match primitives.resolve_page_number(destination) {
        Ok(page) if page >= 1 && page as usize <= primitives.total_page_count() => page,
        Ok(page) => {
            warn!(title = %title, page, "outline destination points outside the document");
            stats.unresolved_destinations += 1;
            stats.warnings.push(format!(
                "outline entry '{title}' points to missing page {page}"
            ));
            0
        }
        Err(error) => {
            warn!(title = %title, error = %error, "failed to resolve outline destination");
            stats.unresolved_destinations += 1;
            stats.warnings.push(format!(
                "outline entry '{title}' has an unresolvable destination: {error}"
            ));
            0
        }
    }
}
