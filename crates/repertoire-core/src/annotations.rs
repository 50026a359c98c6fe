//! Arrows and square highlights stored per position rather than per node,
//! so they show up again on any transposition.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkColor {
    Green,
    Red,
    Blue,
    Yellow,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Arrow {
    pub from: String,
    pub to: String,
    pub color: MarkColor,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Highlight {
    pub square: String,
    pub color: MarkColor,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionAnnotations {
    #[serde(default)]
    pub arrows: BTreeSet<Arrow>,
    #[serde(default)]
    pub highlights: BTreeSet<Highlight>,
}

impl PositionAnnotations {
    pub fn is_empty(&self) -> bool {
        self.arrows.is_empty() && self.highlights.is_empty()
    }
}

/// Snapshot handed to the storage layer.
pub type AnnotationSnapshot = BTreeMap<String, PositionAnnotations>;

/// Keyed by [`crate::model::position_key`]; callers pass the key on every call.
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    entries: HashMap<String, PositionAnnotations>,
}

fn toggle<T: Ord>(set: &mut BTreeSet<T>, item: T) -> bool {
    if set.remove(&item) {
        false
    } else {
        set.insert(item);
        true
    }
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&PositionAnnotations> {
        self.entries.get(key)
    }

    /// Returns true when the arrow is now present.
    pub fn toggle_arrow(&mut self, key: &str, arrow: Arrow) -> bool {
        self.update(key, |a| toggle(&mut a.arrows, arrow))
    }

    /// Returns true when the highlight is now present.
    pub fn toggle_highlight(&mut self, key: &str, highlight: Highlight) -> bool {
        self.update(key, |a| toggle(&mut a.highlights, highlight))
    }

    pub fn clear(&mut self, key: &str) -> Option<PositionAnnotations> {
        self.entries.remove(key)
    }

    fn update<R>(&mut self, key: &str, f: impl FnOnce(&mut PositionAnnotations) -> R) -> R {
        let entry = self.entries.entry(key.to_string()).or_default();
        let result = f(entry);
        if entry.is_empty() {
            self.entries.remove(key);
        }
        result
    }

    pub fn get_all(&self) -> AnnotationSnapshot {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Replace the contents with a snapshot, dropping empty entries.
    pub fn load_all(&mut self, snapshot: AnnotationSnapshot) {
        self.entries = snapshot.into_iter().filter(|(_, v)| !v.is_empty()).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::position_key;

    fn arrow(from: &str, to: &str, color: MarkColor) -> Arrow {
        Arrow {
            from: from.into(),
            to: to.into(),
            color,
        }
    }

    #[test]
    fn test_toggle_twice_restores_set() {
        let mut store = AnnotationStore::new();
        let key = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w";
        store.toggle_arrow(key, arrow("e2", "e4", MarkColor::Green));
        store.toggle_arrow(key, arrow("d2", "d4", MarkColor::Red));
        let before = store.get_all();

        for a in [
            arrow("e2", "e4", MarkColor::Green),
            arrow("g1", "f3", MarkColor::Blue),
        ] {
            store.toggle_arrow(key, a.clone());
            store.toggle_arrow(key, a);
            assert_eq!(store.get_all(), before);
        }
    }

    #[test]
    fn test_toggle_is_exact_match_not_color_replace() {
        let mut store = AnnotationStore::new();
        let key = "k";
        assert!(store.toggle_arrow(key, arrow("e2", "e4", MarkColor::Green)));
        assert!(store.toggle_arrow(key, arrow("e2", "e4", MarkColor::Red)));
        assert_eq!(store.get(key).unwrap().arrows.len(), 2);
    }

    #[test]
    fn test_empty_entries_are_pruned() {
        let mut store = AnnotationStore::new();
        let h = Highlight {
            square: "e4".into(),
            color: MarkColor::Yellow,
        };
        assert!(store.toggle_highlight("k", h.clone()));
        assert_eq!(store.len(), 1);
        assert!(!store.toggle_highlight("k", h));
        assert!(store.is_empty());
        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_transpositions_share_annotations() {
        let mut store = AnnotationStore::new();
        let via_one_order = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3";
        let via_other = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 4 5";
        store.toggle_arrow(&position_key(via_one_order), arrow("f1", "b5", MarkColor::Green));
        assert!(store.get(&position_key(via_other)).is_some());
    }

    #[test]
    fn test_load_all_drops_empty_entries() {
        let mut snapshot = AnnotationSnapshot::new();
        snapshot.insert("empty".into(), PositionAnnotations::default());
        let mut full = PositionAnnotations::default();
        full.arrows.insert(arrow("a1", "a8", MarkColor::Blue));
        snapshot.insert("full".into(), full);

        let mut store = AnnotationStore::new();
        store.load_all(snapshot);
        assert_eq!(store.len(), 1);
        assert!(store.get("full").is_some());

        let json = serde_json::to_value(store.get_all()).unwrap();
        assert_eq!(json["full"]["arrows"][0]["color"], "blue");
    }
}
