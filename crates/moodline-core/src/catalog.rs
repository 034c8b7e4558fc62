//! Library catalog grouped by emotion
//!
//! Classified tracks are filed under their predicted emotion. Groups are
//! iterated in label order; within a group tracks keep insertion order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::Prediction;
use crate::types::Emotion;

/// One classified track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable identifier (usually the file path)
    pub id: String,
    /// Display name
    pub name: String,
    /// Confidence of the predicted emotion
    pub confidence: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionCatalog {
    groups: BTreeMap<Emotion, Vec<CatalogEntry>>,
}

impl EmotionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// File a track under its predicted emotion
    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>, prediction: &Prediction) {
        self.groups
            .entry(prediction.emotion)
            .or_default()
            .push(CatalogEntry {
                id: id.into(),
                name: name.into(),
                confidence: prediction.confidence,
            });
    }

    /// Tracks filed under `emotion`, in insertion order
    pub fn tracks(&self, emotion: Emotion) -> &[CatalogEntry] {
        self.groups.get(&emotion).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(Vec::is_empty)
    }

    /// Non-empty groups in label order
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, &[CatalogEntry])> {
        self.groups
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(&emotion, entries)| (emotion, entries.as_slice()))
    }

    /// Track count per emotion, every emotion included
    pub fn counts(&self) -> Vec<(Emotion, usize)> {
        Emotion::ALL
            .iter()
            .map(|&e| (e, self.tracks(e).len()))
            .collect()
    }

    /// Merge another catalog's entries into this one
    pub fn extend(&mut self, other: EmotionCatalog) {
        for (emotion, entries) in other.groups {
            self.groups.entry(emotion).or_default().extend(entries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(emotion: Emotion, confidence: f32) -> Prediction {
        let mut probabilities = [0.0; 5];
        probabilities[emotion.index()] = confidence;
        Prediction {
            emotion,
            confidence,
            probabilities,
        }
    }

    #[test]
    fn test_grouping_and_order() {
        let mut catalog = EmotionCatalog::new();
        catalog.insert("b.mp3", "b", &prediction(Emotion::Sad, 0.7));
        catalog.insert("a.mp3", "a", &prediction(Emotion::Calm, 0.9));
        catalog.insert("c.mp3", "c", &prediction(Emotion::Sad, 0.5));

        assert_eq!(catalog.len(), 3);
        let sad: Vec<&str> = catalog.tracks(Emotion::Sad).iter().map(|t| t.name.as_str()).collect();
        assert_eq!(sad, ["b", "c"]);
        assert!(catalog.tracks(Emotion::Happy).is_empty());

        let order: Vec<Emotion> = catalog.iter().map(|(e, _)| e).collect();
        assert_eq!(order, [Emotion::Calm, Emotion::Sad]);

        let counts = catalog.counts();
        assert_eq!(counts.len(), 5);
        assert_eq!(counts[4], (Emotion::Sad, 2));
        assert_eq!(counts[2], (Emotion::Happy, 0));
    }

    #[test]
    fn test_extend_and_serialize() {
        let mut a = EmotionCatalog::new();
        a.insert("1", "one", &prediction(Emotion::Happy, 0.6));
        let mut b = EmotionCatalog::new();
        b.insert("2", "two", &prediction(Emotion::Happy, 0.8));
        a.extend(b);
        assert_eq!(a.tracks(Emotion::Happy).len(), 2);

        let yaml = serde_yaml::to_string(&a).unwrap();
        let back: EmotionCatalog = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_empty() {
        let catalog = EmotionCatalog::new();
        assert!(catalog.is_empty());
        assert_eq!(catalog.iter().count(), 0);
    }
}
