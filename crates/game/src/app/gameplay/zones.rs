use engine::{MapObject, Rect};
use tracing::{debug, warn};

use super::dialogue::{MessageCatalog, PLACEHOLDER_MESSAGE};
use super::progress::NpcId;

pub(crate) const INTERACTION_LAYER: &str = "InteractionZones";
pub(crate) const INTERACTION_ID_PROPERTY: &str = "interaction_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InteractionType {
    Message,
    Choice,
    Door,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sfx {
    Item,
    Npc,
    Task,
}

impl Sfx {
    pub(crate) fn key(self) -> &'static str {
        match self {
            Self::Item => "sfx_item_interact",
            Self::Npc => "sfx_npc_interact",
            Self::Task => "sfx_task_interact",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ZoneKind {
    Message {
        variants: Vec<String>,
    },
    Npc {
        npc: Option<NpcId>,
        greeting: String,
        thug: String,
        portrait: String,
    },
    Choice {
        task_number: u32,
    },
    Door {
        locked_message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ZoneEntry {
    pub(crate) id: String,
    pub(crate) bounds: Rect,
    pub(crate) kind: ZoneKind,
}

impl ZoneEntry {
    pub(crate) fn interaction_type(&self) -> InteractionType {
        match self.kind {
            ZoneKind::Message { .. } | ZoneKind::Npc { .. } => InteractionType::Message,
            ZoneKind::Choice { .. } => InteractionType::Choice,
            ZoneKind::Door { .. } => InteractionType::Door,
        }
    }

    pub(crate) fn sfx(&self) -> Sfx {
        match self.kind {
            ZoneKind::Npc { .. } => Sfx::Npc,
            ZoneKind::Choice { .. } => Sfx::Task,
            ZoneKind::Message { .. } | ZoneKind::Door { .. } => Sfx::Item,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ZoneRegistry {
    zones: Vec<ZoneEntry>,
}

impl ZoneRegistry {
    pub(crate) fn build(objects: &[MapObject], catalog: &MessageCatalog) -> Self {
        let mut zones = Vec::with_capacity(objects.len());
        for object in objects {
            let Some(id) = object
                .property(INTERACTION_ID_PROPERTY)
                .map(str::trim)
                .filter(|id| !id.is_empty())
            else {
                continue;
            };
            if object.bounds.is_degenerate() {
                warn!(zone = id, object_id = ?object.object_id, "zone_skipped_degenerate_bounds");
                continue;
            }
            let Some(kind) = classify(id, catalog) else {
                warn!(zone = id, object_id = ?object.object_id, "zone_skipped_bad_task_suffix");
                continue;
            };
            zones.push(ZoneEntry {
                id: id.to_string(),
                bounds: object.bounds,
                kind,
            });
        }
        debug!(zones = zones.len(), "zone_registry_built");
        Self { zones }
    }

    pub(crate) fn len(&self) -> usize {
        self.zones.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&ZoneEntry> {
        self.zones.get(index)
    }

    #[cfg(test)]
    pub(crate) fn find_by_id(&self, id: &str) -> Option<usize> {
        self.zones.iter().position(|zone| zone.id == id)
    }

    /// First zone, in map order, that the body overlaps.
    pub(crate) fn first_overlapping(&self, body: &Rect) -> Option<usize> {
        self.zones.iter().position(|zone| zone.bounds.overlaps(body))
    }
}

fn classify(id: &str, catalog: &MessageCatalog) -> Option<ZoneKind> {
    if let Some(suffix) = id.strip_prefix("task") {
        let task_number = suffix.parse::<u32>().ok()?;
        return Some(ZoneKind::Choice { task_number });
    }
    if id.starts_with("door") {
        return Some(ZoneKind::Door {
            locked_message: catalog.text_or_placeholder(id),
        });
    }
    if let Some(suffix) = id.strip_prefix("npc") {
        return Some(ZoneKind::Npc {
            npc: suffix.parse::<u32>().ok().and_then(NpcId::new),
            greeting: catalog.text_or_placeholder(id),
            thug: catalog.text_or_placeholder(&format!("{id}-thug")),
            portrait: format!("{id}_portrait"),
        });
    }

    let variants = catalog.variants(id);
    Some(ZoneKind::Message {
        variants: if variants.is_empty() {
            vec![PLACEHOLDER_MESSAGE.to_string()]
        } else {
            variants
        },
    })
}
