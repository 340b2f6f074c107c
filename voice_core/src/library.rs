//! Voice library loaded from a JSON sidecar file.
//!
//! The store is a single `voices.json` mapping voice ids to reference
//! audio and display metadata. Two layouts are accepted: the current one
//! with a `default_voice` key and a `voices` object, and a legacy flat
//! `id -> path` map.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceEntry {
    /// Reference audio path, relative to the voices directory.
    pub reference: String,
    pub display_name: Option<String>,
    pub gender: Option<String>,
    pub quality: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VoiceLibrary {
    default_voice: Option<String>,
    voices: HashMap<String, VoiceEntry>,
}

impl VoiceLibrary {
    /// Empty library; `/tts` will reject requests until voices exist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `voices.json`.
    pub fn from_sidecar<P: AsRef<Path>>(p: P) -> anyhow::Result<Self> {
        let text = fs::read_to_string(p.as_ref())
            .with_context(|| format!("Failed to load {}", p.as_ref().display()))?;
        let json: serde_json::Value =
            serde_json::from_str(&text).with_context(|| "voices.json is not valid JSON")?;

        let obj = json
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("voices.json must be a JSON object"))?;

        let mut voices: HashMap<String, VoiceEntry> = HashMap::new();
        let mut default_voice: Option<String> = None;

        if let Some(voices_obj) = obj.get("voices").and_then(|v| v.as_object()) {
            // Current layout
            default_voice = obj
                .get("default_voice")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());

            for (id, data) in voices_obj {
                let entry: VoiceEntry = serde_json::from_value(data.clone())
                    .with_context(|| format!("invalid entry for voice {id}"))?;
                voices.insert(id.clone(), entry);
            }
        } else {
            // Legacy layout: flat id -> reference path
            for (id, v) in obj {
                match v {
                    serde_json::Value::String(path) => {
                        voices.insert(
                            id.clone(),
                            VoiceEntry {
                                reference: path.clone(),
                                display_name: None,
                                gender: None,
                                quality: None,
                            },
                        );
                    }
                    _ => {
                        return Err(anyhow::anyhow!(
                            "invalid entry for voice {} (expected string path)",
                            id
                        ));
                    }
                }
            }
        }

        if let Some(ref d) = default_voice {
            if !voices.contains_key(d) {
                return Err(anyhow::anyhow!("default_voice '{d}' is not in voices"));
            }
        }

        Ok(Self {
            default_voice,
            voices,
        })
    }

    /// Sorted voice ids.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.voices.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VoiceEntry)> {
        self.voices.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn default_voice(&self) -> Option<&str> {
        self.default_voice.as_deref()
    }

    /// Resolve a voice id (or the default when none given) to its entry.
    pub fn resolve(&self, voice: Option<&str>) -> anyhow::Result<(&str, &VoiceEntry)> {
        let id = match voice.or(self.default_voice.as_deref()) {
            Some(id) => id,
            None => {
                return Err(anyhow::anyhow!(
                    "no voice requested and no default voice configured"
                ))
            }
        };
        match self.voices.get_key_value(id) {
            Some((k, v)) => Ok((k.as_str(), v)),
            None => Err(anyhow::anyhow!(
                "Unknown voice '{}'. Available voices: {}",
                id,
                self.list().join(", ")
            )),
        }
    }
}
