//! Acyclic persisted form of a [`MoveTree`].
//!
//! The working tree carries parent back-references; the plain form nests
//! children by value and has no parent field, so it can be written with
//! serde to any store.

use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::model::Move;
use crate::tree::{MoveTree, NodeRef};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlainNode {
    pub id: String,
    #[serde(rename = "move")]
    pub mv: Move,
    pub fen: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub children: Vec<PlainNode>,
    #[serde(default)]
    pub is_main_line: bool,
}

/// Depth-first copy of every node, children order preserved.
pub fn serialize(tree: &MoveTree) -> Vec<PlainNode> {
    tree.roots()
        .iter()
        .filter_map(|&root| plain_node(tree, root))
        .collect()
}

fn plain_node(tree: &MoveTree, node: NodeRef) -> Option<PlainNode> {
    let n = tree.get(node)?;
    Some(PlainNode {
        id: n.id.clone(),
        mv: n.mv.clone(),
        fen: n.fen.clone(),
        comment: n.comment.clone(),
        children: n
            .children()
            .iter()
            .filter_map(|&c| plain_node(tree, c))
            .collect(),
        is_main_line: n.is_main_line,
    })
}

/// Rebuild a working tree, re-linking every parent. Ids, flags and comments
/// are copied as stored; no main-line repair happens here.
pub fn deserialize(roots: &[PlainNode]) -> MoveTree {
    let mut tree = MoveTree::new();
    // Children are pushed in reverse so each parent receives them in order.
    let mut stack: Vec<(Option<NodeRef>, &PlainNode)> =
        roots.iter().rev().map(|r| (None, r)).collect();

    while let Some((parent, plain)) = stack.pop() {
        match attach_plain(&mut tree, parent, plain) {
            Ok(handle) => {
                stack.extend(plain.children.iter().rev().map(|c| (Some(handle), c)));
            }
            Err(e) => tracing::warn!("Skipping node {} during deserialize: {e}", plain.id),
        }
    }

    tree
}

fn attach_plain(
    tree: &mut MoveTree,
    parent: Option<NodeRef>,
    plain: &PlainNode,
) -> Result<NodeRef, TreeError> {
    tree.attach(
        parent,
        plain.id.clone(),
        plain.mv.clone(),
        plain.fen.clone(),
        plain.comment.clone(),
        plain.is_main_line,
    )
}

impl From<Vec<PlainNode>> for MoveTree {
    fn from(plain: Vec<PlainNode>) -> Self {
        deserialize(&plain)
    }
}
