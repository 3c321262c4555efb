use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single strain indicator produced by a detector.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrainSignal {
    pub name: String,
    pub detected: bool,
    pub value: f64,
    pub threshold: f64,
    pub description: String,
}

impl StrainSignal {
    pub fn new(name: impl Into<String>, detected: bool, value: f64, threshold: f64) -> Self {
        Self {
            name: name.into(),
            detected,
            value,
            threshold,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// `value / threshold`, or `None` when the threshold is zero.
    pub fn ratio(&self) -> Option<f64> {
        if self.threshold == 0.0 {
            None
        } else {
            Some(self.value / self.threshold)
        }
    }
}

/// Named collection of strain signals, keyed by signal name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrainSignals {
    signals: BTreeMap<String, StrainSignal>,
}

impl StrainSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a signal, replacing any previous signal with the same name.
    pub fn insert(&mut self, signal: StrainSignal) {
        self.signals.insert(signal.name.clone(), signal);
    }

    pub fn with(mut self, signal: StrainSignal) -> Self {
        self.insert(signal);
        self
    }

    pub fn get(&self, name: &str) -> Option<&StrainSignal> {
        self.signals.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StrainSignal> {
        self.signals.values()
    }

    /// Signals whose `detected` flag is set.
    pub fn detected(&self) -> impl Iterator<Item = &StrainSignal> {
        self.signals.values().filter(|s| s.detected)
    }

    pub fn any_detected(&self) -> bool {
        self.signals.values().any(|s| s.detected)
    }

    pub fn count_detected(&self) -> usize {
        self.detected().count()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

impl FromIterator<StrainSignal> for StrainSignals {
    fn from_iter<I: IntoIterator<Item = StrainSignal>>(iter: I) -> Self {
        let mut signals = Self::new();
        for signal in iter {
            signals.insert(signal);
        }
        signals
    }
}
