//! Mutable move tree with main-line/variation semantics.
//!
//! Nodes live in an arena and are addressed by [`NodeRef`] handles, which
//! makes the parent back-reference a plain index instead of a cycle. Removed
//! nodes vacate their slot; a stale handle yields [`TreeError::UnknownNode`].

use uuid::Uuid;

use crate::error::TreeError;
use crate::model::Move;

/// Handle to a node inside one [`MoveTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(usize);

impl NodeRef {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveNode {
    pub id: String,
    pub mv: Move,
    /// Position after `mv`.
    pub fen: String,
    pub comment: Option<String>,
    pub is_main_line: bool,
    children: Vec<NodeRef>,
    parent: Option<NodeRef>,
}

impl MoveNode {
    pub fn children(&self) -> &[NodeRef] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.parent
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MoveTree {
    slots: Vec<Option<MoveNode>>,
    roots: Vec<NodeRef>,
}

pub fn new_node_id() -> String {
    Uuid::new_v4().to_string()
}

impl MoveTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roots(&self) -> &[NodeRef] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn get(&self, node: NodeRef) -> Option<&MoveNode> {
        self.slots.get(node.0).and_then(|s| s.as_ref())
    }

    pub fn node(&self, node: NodeRef) -> Result<&MoveNode, TreeError> {
        self.get(node).ok_or(TreeError::UnknownNode(node.0))
    }

    fn node_mut(&mut self, node: NodeRef) -> Result<&mut MoveNode, TreeError> {
        self.slots
            .get_mut(node.0)
            .and_then(|s| s.as_mut())
            .ok_or(TreeError::UnknownNode(node.0))
    }

    /// Children of `parent`, or the roots when `parent` is `None`.
    pub fn children_of(&self, parent: Option<NodeRef>) -> Result<&[NodeRef], TreeError> {
        match parent {
            None => Ok(&self.roots),
            Some(p) => Ok(&self.node(p)?.children),
        }
    }

    fn children_of_mut(&mut self, parent: Option<NodeRef>) -> Result<&mut Vec<NodeRef>, TreeError> {
        match parent {
            None => Ok(&mut self.roots),
            Some(p) => Ok(&mut self.node_mut(p)?.children),
        }
    }

    pub fn find_by_id(&self, id: &str) -> Option<NodeRef> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|n| n.id == id))
            .map(NodeRef)
    }

    pub fn resolve_id(&self, id: &str) -> Result<NodeRef, TreeError> {
        self.find_by_id(id)
            .ok_or_else(|| TreeError::UnknownNodeId(id.to_string()))
    }

    /// Append a node without any main-line bookkeeping. Used when rebuilding
    /// a tree from its persisted form.
    pub(crate) fn attach(
        &mut self,
        parent: Option<NodeRef>,
        id: String,
        mv: Move,
        fen: String,
        comment: Option<String>,
        is_main_line: bool,
    ) -> Result<NodeRef, TreeError> {
        // Validate the parent before taking a slot.
        self.children_of(parent)?;

        let handle = NodeRef(self.slots.len());
        self.slots.push(Some(MoveNode {
            id,
            mv,
            fen,
            comment,
            is_main_line,
            children: Vec::new(),
            parent,
        }));
        self.children_of_mut(parent)?.push(handle);
        Ok(handle)
    }

    /// Add `mv` below `parent` (or as a root). An existing child with the
    /// same from/to/promotion is returned untouched. A new child is flagged
    /// main line only when it is the first child.
    pub fn insert_move(
        &mut self,
        parent: Option<NodeRef>,
        mv: Move,
        fen: String,
    ) -> Result<NodeRef, TreeError> {
        let siblings = self.children_of(parent)?;
        let attempt = mv.attempt();
        if let Some(existing) = siblings
            .iter()
            .copied()
            .find(|&c| self.get(c).is_some_and(|n| n.mv.matches(&attempt)))
        {
            return Ok(existing);
        }

        let is_main_line = siblings.is_empty();
        self.attach(parent, new_node_id(), mv, fen, None, is_main_line)
    }

    /// Flag `node` as main line and clear the flag on its siblings. Roots are
    /// left alone; see [`MoveTree::promote_root`].
    pub fn promote_to_main_line(&mut self, node: NodeRef) -> Result<(), TreeError> {
        let Some(parent) = self.node(node)?.parent else {
            return Ok(());
        };
        let siblings = self.node(parent)?.children.clone();
        for sibling in siblings {
            self.node_mut(sibling)?.is_main_line = sibling == node;
        }
        Ok(())
    }

    /// Root promotion: move the root to the front and make it the only
    /// flagged root.
    pub fn promote_root(&mut self, node: NodeRef) -> Result<(), TreeError> {
        if self.node(node)?.parent.is_some() {
            return self.promote_to_main_line(node);
        }
        self.roots.retain(|&r| r != node);
        self.roots.insert(0, node);
        let roots = self.roots.clone();
        for root in roots {
            self.node_mut(root)?.is_main_line = root == node;
        }
        Ok(())
    }

    /// Remove `node` and its descendants. Returns the number of nodes
    /// removed. If the node was main line, the first remaining sibling
    /// becomes main line.
    pub fn prune_subtree(&mut self, node: NodeRef) -> Result<usize, TreeError> {
        let (parent, was_main) = {
            let n = self.node(node)?;
            (n.parent, n.is_main_line)
        };

        let siblings = self.children_of_mut(parent)?;
        siblings.retain(|&c| c != node);
        let promote = if was_main { siblings.first().copied() } else { None };
        if let Some(first) = promote {
            self.node_mut(first)?.is_main_line = true;
        }

        let mut removed = 0;
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(slot) = self.slots.get_mut(current.0) {
                if let Some(n) = slot.take() {
                    stack.extend(n.children);
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    pub fn set_comment(&mut self, node: NodeRef, comment: Option<String>) -> Result<(), TreeError> {
        let comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self.node_mut(node)?.comment = comment;
        Ok(())
    }

    /// Append to an existing comment (PGN may carry several per move).
    pub(crate) fn append_comment(&mut self, node: NodeRef, text: &str) -> Result<(), TreeError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let n = self.node_mut(node)?;
        n.comment = Some(match n.comment.take() {
            Some(existing) => format!("{existing} {text}"),
            None => text.to_string(),
        });
        Ok(())
    }

    /// The main-line child of `parent` (or the main root). The first
    /// flagged child wins; when no child is flagged the first child is used
    /// and the violation is logged.
    pub fn main_child(&self, parent: Option<NodeRef>) -> Option<NodeRef> {
        let children = self.children_of(parent).ok()?;
        if let Some(flagged) = children
            .iter()
            .copied()
            .find(|&c| self.get(c).is_some_and(|n| n.is_main_line))
        {
            return Some(flagged);
        }
        let first = children.first().copied()?;
        tracing::warn!(
            parent = ?parent.map(|p| p.0),
            children = children.len(),
            "No child flagged as main line, falling back to first child"
        );
        Some(first)
    }

    /// Nodes on the main line, starting at the main root.
    pub fn main_line(&self) -> Vec<NodeRef> {
        let mut line = Vec::new();
        let mut current = self.main_child(None);
        while let Some(node) = current {
            line.push(node);
            current = self.main_child(Some(node));
        }
        line
    }

    /// Path from the root down to and including `node`.
    pub fn path_to(&self, node: NodeRef) -> Result<Vec<NodeRef>, TreeError> {
        let mut path = vec![node];
        let mut current = self.node(node)?.parent;
        while let Some(p) = current {
            path.push(p);
            current = self.node(p)?.parent;
        }
        path.reverse();
        Ok(path)
    }

    /// Deep copy of `node` keeping only the main-line branch at every level,
    /// without comments. The copy is the single root of the returned tree.
    pub fn main_line_only(&self, node: NodeRef) -> Result<MoveTree, TreeError> {
        let mut copy = MoveTree::new();
        let mut source = Some(node);
        let mut target_parent = None;
        while let Some(current) = source {
            let n = self.node(current)?;
            let added = copy.attach(
                target_parent,
                n.id.clone(),
                n.mv.clone(),
                n.fen.clone(),
                None,
                true,
            )?;
            target_parent = Some(added);
            source = self.main_child(Some(current));
        }
        Ok(copy)
    }

    /// "Clear variations": the main line from the main root, comments dropped.
    pub fn clear_variations(&self) -> Result<MoveTree, TreeError> {
        match self.main_child(None) {
            Some(root) => self.main_line_only(root),
            None => Ok(MoveTree::new()),
        }
    }

    /// All live nodes in depth-first order (roots, then children in order).
    pub fn depth_first(&self) -> Vec<NodeRef> {
        let mut order = Vec::with_capacity(self.node_count());
        let mut stack: Vec<NodeRef> = self.roots.iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if let Some(n) = self.get(node) {
                order.push(node);
                stack.extend(n.children.iter().rev().copied());
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Color, Promotion};

    fn mv(from: &str, to: &str, san: &str, color: Color) -> Move {
        Move {
            from: from.into(),
            to: to.into(),
            san: san.into(),
            color,
            promotion: None,
        }
    }

    fn sample() -> (MoveTree, NodeRef, NodeRef, NodeRef) {
        let mut tree = MoveTree::new();
        let e4 = tree
            .insert_move(None, mv("e2", "e4", "e4", Color::White), "fen-e4".into())
            .unwrap();
        let e5 = tree
            .insert_move(Some(e4), mv("e7", "e5", "e5", Color::Black), "fen-e5".into())
            .unwrap();
        let c5 = tree
            .insert_move(Some(e4), mv("c7", "c5", "c5", Color::Black), "fen-c5".into())
            .unwrap();
        (tree, e4, e5, c5)
    }

    #[test]
    fn test_insert_is_idempotent() {
        let (mut tree, e4, e5, _) = sample();
        let again = tree
            .insert_move(Some(e4), mv("e7", "e5", "e5", Color::Black), "other".into())
            .unwrap();
        assert_eq!(again, e5);
        assert_eq!(tree.node(e4).unwrap().children().len(), 2);
        assert_eq!(tree.node(e5).unwrap().fen, "fen-e5");
    }

    #[test]
    fn test_insert_distinguishes_promotion() {
        let mut tree = MoveTree::new();
        let mut queen = mv("e7", "e8", "e8=Q", Color::White);
        queen.promotion = Some(Promotion::Queen);
        let mut knight = mv("e7", "e8", "e8=N", Color::White);
        knight.promotion = Some(Promotion::Knight);
        let q = tree.insert_move(None, queen, "q".into()).unwrap();
        let n = tree.insert_move(None, knight, "n".into()).unwrap();
        assert_ne!(q, n);
        assert!(tree.node(q).unwrap().is_main_line);
        assert!(!tree.node(n).unwrap().is_main_line);
    }

    #[test]
    fn test_first_child_is_main_line() {
        let (tree, e4, e5, c5) = sample();
        assert!(tree.node(e4).unwrap().is_main_line);
        assert!(tree.node(e5).unwrap().is_main_line);
        assert!(!tree.node(c5).unwrap().is_main_line);
        assert_eq!(tree.node(c5).unwrap().parent(), Some(e4));
    }

    #[test]
    fn test_promote_clears_siblings() {
        let (mut tree, e4, e5, c5) = sample();
        tree.promote_to_main_line(c5).unwrap();
        assert!(tree.node(c5).unwrap().is_main_line);
        assert!(!tree.node(e5).unwrap().is_main_line);
        assert_eq!(tree.main_line(), vec![e4, c5]);
    }

    #[test]
    fn test_promote_root_is_noop_for_flags_but_reorders() {
        let (mut tree, e4, _, _) = sample();
        let d4 = tree
            .insert_move(None, mv("d2", "d4", "d4", Color::White), "fen-d4".into())
            .unwrap();
        tree.promote_to_main_line(d4).unwrap();
        assert!(!tree.node(d4).unwrap().is_main_line);

        tree.promote_root(d4).unwrap();
        assert_eq!(tree.roots(), &[d4, e4]);
        assert!(tree.node(d4).unwrap().is_main_line);
        assert!(!tree.node(e4).unwrap().is_main_line);
    }

    #[test]
    fn test_prune_main_line_promotes_first_remaining() {
        let (mut tree, e4, e5, c5) = sample();
        let nf3 = tree
            .insert_move(Some(e5), mv("g1", "f3", "Nf3", Color::White), "fen-nf3".into())
            .unwrap();
        let removed = tree.prune_subtree(e5).unwrap();
        assert_eq!(removed, 2);
        assert!(tree.get(nf3).is_none());
        assert_eq!(tree.node(e4).unwrap().children(), &[c5]);
        assert!(tree.node(c5).unwrap().is_main_line);
        assert_eq!(tree.node_count(), 2);
        assert_eq!(tree.prune_subtree(e5), Err(TreeError::UnknownNode(e5.index())));
    }

    #[test]
    fn test_missing_flag_falls_back_to_first_child() {
        let (mut tree, e4, e5, c5) = sample();
        tree.node_mut(e5).unwrap().is_main_line = false;
        assert_eq!(tree.main_child(Some(e4)), Some(e5));

        // Two flagged children: the first in order wins.
        tree.node_mut(c5).unwrap().is_main_line = true;
        tree.node_mut(e5).unwrap().is_main_line = true;
        assert_eq!(tree.main_child(Some(e4)), Some(e5));
    }

    #[test]
    fn test_main_line_only_drops_variations_and_comments() {
        let (mut tree, e4, e5, _) = sample();
        tree.set_comment(e4, Some("King's pawn".into())).unwrap();
        tree.insert_move(Some(e5), mv("g1", "f3", "Nf3", Color::White), "fen-nf3".into())
            .unwrap();

        let copy = tree.main_line_only(e4).unwrap();
        assert_eq!(copy.node_count(), 3);
        let line = copy.main_line();
        let sans: Vec<&str> = line
            .iter()
            .map(|&n| copy.node(n).unwrap().mv.san.as_str())
            .collect();
        assert_eq!(sans, vec!["e4", "e5", "Nf3"]);
        assert!(line.iter().all(|&n| copy.node(n).unwrap().comment.is_none()));
        assert_eq!(copy.node(line[0]).unwrap().id, tree.node(e4).unwrap().id);
    }

    #[test]
    fn test_path_to_and_depth_first() {
        let (tree, e4, e5, c5) = sample();
        assert_eq!(tree.path_to(c5).unwrap(), vec![e4, c5]);
        assert_eq!(tree.depth_first(), vec![e4, e5, c5]);
        let id = tree.node(c5).unwrap().id.clone();
        assert_eq!(tree.resolve_id(&id), Ok(c5));
    }
}
