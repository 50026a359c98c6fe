//! Root-to-leaf line extraction, filtering and previews.

use serde::{Deserialize, Serialize};

use crate::model::{Color, Move};
use crate::study::{Chapter, Study};
use crate::tree::{MoveTree, NodeRef};

/// Snapshot of one tree node on a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineStep {
    pub node_id: String,
    #[serde(rename = "move")]
    pub mv: Move,
    pub fen: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyLine {
    /// `<chapter id>:<leaf node id>`, stable while the leaf exists.
    pub id: String,
    pub chapter_id: String,
    pub chapter_name: String,
    pub start_fen: String,
    pub path: Vec<LineStep>,
    pub orientation: Color,
    pub enabled: bool,
    pub depth: usize,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl StudyLine {
    pub fn leaf(&self) -> Option<&LineStep> {
        self.path.last()
    }
}

/// Every root-to-leaf path, roots in order then children in stored order.
pub fn extract_paths(tree: &MoveTree) -> Vec<Vec<NodeRef>> {
    let mut paths = Vec::new();
    let mut current = Vec::new();
    for &root in tree.roots() {
        walk(tree, root, &mut current, &mut paths);
    }
    paths
}

fn walk(tree: &MoveTree, node: NodeRef, current: &mut Vec<NodeRef>, paths: &mut Vec<Vec<NodeRef>>) {
    let Some(n) = tree.get(node) else {
        return;
    };
    current.push(node);
    if n.is_leaf() {
        paths.push(current.clone());
    } else {
        for &child in n.children() {
            walk(tree, child, current, paths);
        }
    }
    current.pop();
}

fn chapter_tags(chapter: &Chapter) -> Vec<String> {
    ["ECO", "Opening"]
        .iter()
        .filter_map(|key| chapter.game.metadata.get(*key))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "?")
        .collect()
}

pub fn extract_lines(chapter: &Chapter) -> Vec<StudyLine> {
    let tree = &chapter.game.tree;
    let tags = chapter_tags(chapter);

    extract_paths(tree)
        .into_iter()
        .map(|path| {
            let steps: Vec<LineStep> = path
                .iter()
                .filter_map(|&r| tree.get(r))
                .map(|n| LineStep {
                    node_id: n.id.clone(),
                    mv: n.mv.clone(),
                    fen: n.fen.clone(),
                    comment: n.comment.clone(),
                })
                .collect();
            let leaf_id = steps.last().map(|s| s.node_id.as_str()).unwrap_or_default();
            StudyLine {
                id: format!("{}:{}", chapter.id, leaf_id),
                chapter_id: chapter.id.clone(),
                chapter_name: chapter.name.clone(),
                start_fen: chapter.game.initial_fen.clone(),
                depth: steps.len(),
                path: steps,
                orientation: chapter.orientation,
                enabled: true,
                tags: tags.clone(),
            }
        })
        .collect()
}

/// Lines of the selected chapters, in study chapter order. An empty
/// selection means every chapter.
pub fn extract_study_lines(study: &Study, chapter_ids: &[String]) -> Vec<StudyLine> {
    study
        .chapters
        .iter()
        .filter(|c| chapter_ids.is_empty() || chapter_ids.contains(&c.id))
        .flat_map(extract_lines)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineFilter {
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub only_enabled: bool,
    /// A line passes when it carries any of these tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl LineFilter {
    pub fn matches(&self, line: &StudyLine) -> bool {
        if self.only_enabled && !line.enabled {
            return false;
        }
        if let Some(max) = self.max_depth {
            if line.depth > max {
                return false;
            }
        }
        self.tags.is_empty() || self.tags.iter().any(|t| line.tags.contains(t))
    }
}

pub fn filter_lines(lines: &[StudyLine], filter: &LineFilter) -> Vec<StudyLine> {
    lines.iter().filter(|l| filter.matches(l)).cloned().collect()
}

/// Full-move number and side to move from a FEN, defaulting to 1 / white.
fn fen_move_number(fen: &str) -> (u32, Color) {
    let fields: Vec<&str> = fen.split_whitespace().collect();
    let turn = fields
        .get(1)
        .and_then(|f| Color::from_fen_turn(f))
        .unwrap_or(Color::White);
    let number = fields
        .get(5)
        .and_then(|f| f.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(1);
    (number, turn)
}

/// First `max_moves` plies as movetext, e.g. `1. e4 e5 2. Nf3 ...`.
pub fn line_preview(line: &StudyLine, max_moves: usize) -> String {
    let (mut number, _) = fen_move_number(&line.start_fen);
    let mut parts = Vec::new();

    for (i, step) in line.path.iter().take(max_moves).enumerate() {
        match step.mv.color {
            Color::White => parts.push(format!("{number}. {}", step.mv.san)),
            Color::Black => {
                if i == 0 {
                    parts.push(format!("{number}... {}", step.mv.san));
                } else {
                    parts.push(step.mv.san.clone());
                }
                number += 1;
            }
        }
    }

    if line.path.len() > max_moves {
        parts.push("...".to_string());
    }
    parts.join(" ")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineStats {
    pub total: usize,
    pub enabled: usize,
    pub longest: usize,
    pub shortest: usize,
    pub average_depth: f64,
}

pub fn line_stats(lines: &[StudyLine]) -> LineStats {
    if lines.is_empty() {
        return LineStats::default();
    }
    let total_depth: usize = lines.iter().map(|l| l.depth).sum();
    LineStats {
        total: lines.len(),
        enabled: lines.iter().filter(|l| l.enabled).count(),
        longest: lines.iter().map(|l| l.depth).max().unwrap_or(0),
        shortest: lines.iter().map(|l| l.depth).min().unwrap_or(0),
        average_depth: ((total_depth as f64 / lines.len() as f64) * 10.0).round() / 10.0,
    }
}
