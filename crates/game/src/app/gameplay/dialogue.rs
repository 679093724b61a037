use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

pub(crate) const PLACEHOLDER_MESSAGE: &str = "...";
pub(crate) const DOOR_LOCKED_MESSAGE: &str = "Find the 6 keys to open this door.";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum MessagePayload {
    Single(String),
    Variants(Vec<String>),
}

#[derive(Debug, Error)]
pub(crate) enum CatalogError {
    #[error("failed to read message catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse message catalog at {path}: {message}")]
    Parse { path: String, message: String },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MessageCatalog {
    entries: HashMap<String, MessagePayload>,
}

impl MessageCatalog {
    pub(crate) fn builtin() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            "door".to_string(),
            MessagePayload::Single(DOOR_LOCKED_MESSAGE.to_string()),
        );
        Self { entries }
    }

    pub(crate) fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let raw_entries =
            serde_path_to_error::deserialize::<_, Map<String, Value>>(&mut deserializer)
                .map_err(|error| {
                    let path = error.path().to_string();
                    CatalogError::Parse {
                        path: if path.is_empty() { ".".to_string() } else { path },
                        message: error.into_inner().to_string(),
                    }
                })?;

        let mut entries = HashMap::with_capacity(raw_entries.len());
        for (zone_id, value) in raw_entries {
            match serde_json::from_value::<MessagePayload>(value) {
                Ok(payload) => {
                    entries.insert(zone_id, payload);
                }
                Err(error) => {
                    warn!(zone = %zone_id, error = %error, "message_entry_skipped");
                }
            }
        }
        Ok(Self { entries })
    }

    pub(crate) fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let loaded = Self::from_json_str(&raw)?;
        let mut catalog = Self::builtin();
        catalog.entries.extend(loaded.entries);
        Ok(catalog)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn text(&self, id: &str) -> Option<&str> {
        match self.entries.get(id)? {
            MessagePayload::Single(text) => Some(text.as_str()),
            MessagePayload::Variants(variants) => variants.first().map(String::as_str),
        }
    }

    pub(crate) fn text_or_placeholder(&self, id: &str) -> String {
        self.text(id)
            .filter(|text| !text.is_empty())
            .unwrap_or(PLACEHOLDER_MESSAGE)
            .to_string()
    }

    pub(crate) fn variants(&self, id: &str) -> Vec<String> {
        match self.entries.get(id) {
            Some(MessagePayload::Single(text)) => vec![text.clone()],
            Some(MessagePayload::Variants(variants)) => variants.clone(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_single_and_variant_entries() {
        let raw = json!({
            "npc1": "Hey, listen up!",
            "sign": ["A", "B", "C"],
            "npc1-thug": "Back again?"
        })
        .to_string();
        let catalog = MessageCatalog::from_json_str(&raw).expect("catalog");

        assert_eq!(catalog.text("npc1"), Some("Hey, listen up!"));
        assert_eq!(catalog.variants("sign"), vec!["A", "B", "C"]);
        assert_eq!(catalog.text("sign"), Some("A"));
        assert_eq!(catalog.text_or_placeholder("missing"), PLACEHOLDER_MESSAGE);
        assert!(catalog.variants("missing").is_empty());
    }

    #[test]
    fn malformed_entries_are_skipped_and_the_rest_kept() {
        let raw = json!({
            "npc1": "ok",
            "npc3": 5,
            "well": { "a": 1 },
            "sign": ["A", 2],
            "campfire": ["Warm.", "Crackling."]
        })
        .to_string();
        let catalog = MessageCatalog::from_json_str(&raw).expect("catalog");

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.text("npc1"), Some("ok"));
        assert_eq!(catalog.variants("campfire"), vec!["Warm.", "Crackling."]);
        assert_eq!(catalog.text_or_placeholder("npc3"), PLACEHOLDER_MESSAGE);
        assert!(catalog.variants("well").is_empty());
        assert!(catalog.variants("sign").is_empty());
    }

    #[test]
    fn non_object_catalog_is_a_parse_error() {
        let err = MessageCatalog::from_json_str("[\"npc1\"]").expect_err("err");
        match err {
            CatalogError::Parse { path, .. } => assert_eq!(path, "."),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_keeps_good_entries_next_to_a_bad_one() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("messages.json");
        fs::write(&path, json!({ "npc2": "Hi.", "npc4": null }).to_string()).expect("write");

        let catalog = MessageCatalog::load(&path).expect("load");
        assert_eq!(catalog.text("npc2"), Some("Hi."));
        assert_eq!(catalog.text("door"), Some(DOOR_LOCKED_MESSAGE));
        assert_eq!(catalog.text("npc4"), None);
    }

    #[test]
    fn load_layers_file_over_builtin_entries() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("messages.json");
        fs::write(&path, json!({ "npc7": "Listen..." }).to_string()).expect("write");

        let catalog = MessageCatalog::load(&path).expect("load");
        assert_eq!(catalog.text("door"), Some(DOOR_LOCKED_MESSAGE));
        assert_eq!(catalog.text("npc7"), Some("Listen..."));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = MessageCatalog::load(&temp.path().join("absent.json")).expect_err("err");
        assert!(matches!(err, CatalogError::Read { .. }));
    }
}
