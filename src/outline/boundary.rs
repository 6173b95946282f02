use super::tree::{NodeId, OutlineTree};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextSection {
    pub page: u32,
    pub title: String,
}

impl OutlineTree {
    pub fn first_valid_page(&self, id: NodeId) -> Option<(u32, NodeId)> {
        self.preorder_from(id)
            .into_iter()
            .map(|candidate| (self.node(candidate).page_number, candidate))
            .find(|(page, _)| *page > 0)
    }

    pub fn find_next_section(&self, id: NodeId) -> Option<NextSection> {
        let mut current = id;
        loop {
            let parent = self.node(current).parent()?;
            let index = self.sibling_index(current)?;

            let following = self.node(parent).children().iter().skip(index + 1);
            for sibling in following {
                if let Some((page, source)) = self.first_valid_page(*sibling) {
                    return Some(NextSection {
                        page,
                        title: self.node(source).title.clone(),
                    });
                }
            }

            if self.is_root(parent) {
                return None;
            }
            current = parent;
        }
    }

    pub fn find_next_start_page(&self, id: NodeId, total_pages: usize) -> u32 {
        self.find_next_section(id)
            .map_or(total_pages as u32, |next| next.page)
    }

    pub fn resolve_boundaries(&mut self, total_pages: usize) {
        for id in self.preorder() {
            let next = self.find_next_section(id);
            let node = self.node_mut(id);
            node.next_boundary_page = Some(next.as_ref().map_or(total_pages as u32, |n| n.page));
            node.next_title = next.map(|n| n.title);
        }
    }
}
