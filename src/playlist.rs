//! Playlist rotation
//!
//! [`Playlist`] owns the ordered items a client rotates through, the current
//! rotation index and one [`CallbackInstance`] per item slot. `tick` renders
//! the current item and advances; `render_by_id` renders any item without
//! touching the rotation.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::composer::LayoutComposer;
use crate::pipeline::{CallbackInstance, RenderContext};
use crate::source::SourceRegistry;
use crate::{Error, RenderResponse, Result, ViewType};

/// Named arrangement of slots on the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layout {
    /// One slot filling the screen
    #[serde(rename = "full")]
    Full,
    /// Two slots side by side
    #[serde(rename = "2-col", alias = "split")]
    TwoCol,
}

impl Layout {
    pub fn as_str(self) -> &'static str {
        match self {
            Layout::Full => "full",
            Layout::TwoCol => "2-col",
        }
    }

    /// Number of slots this layout requires
    pub fn slot_count(self) -> usize {
        match self {
            Layout::Full => 1,
            Layout::TwoCol => 2,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A slot bound to a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotConfig {
    pub name: String,
    pub source: String,
    #[serde(default)]
    pub options: Value,
}

#[derive(Deserialize)]
struct SlotBody {
    source: String,
    #[serde(default)]
    options: Value,
}

/// One entry of a playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub id: String,
    pub layout: Layout,
    /// Slots in declaration order
    #[serde(deserialize_with = "deserialize_slots")]
    pub slots: Vec<SlotConfig>,
}

impl PlaylistItem {
    /// A `full` item with a single slot named `main`.
    pub fn full(id: impl Into<String>, source: impl Into<String>, options: Value) -> Self {
        Self {
            id: id.into(),
            layout: Layout::Full,
            slots: vec![SlotConfig {
                name: "main".into(),
                source: source.into(),
                options,
            }],
        }
    }
}

/// Slots may be written as a list of `{name, source, options}` or as an
/// object keyed by slot name; object order is declaration order.
fn deserialize_slots<'de, D>(deserializer: D) -> std::result::Result<Vec<SlotConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Slots {
        List(Vec<SlotConfig>),
        Named(serde_json::Map<String, Value>),
    }

    match Slots::deserialize(deserializer)? {
        Slots::List(list) => Ok(list),
        Slots::Named(map) => map
            .into_iter()
            .map(|(name, body)| {
                let body: SlotBody = serde_json::from_value(body).map_err(serde::de::Error::custom)?;
                Ok(SlotConfig {
                    name,
                    source: body.source,
                    options: body.options,
                })
            })
            .collect(),
    }
}

/// Read a playlist file (a JSON array of items).
pub fn load_playlist(path: impl AsRef<Path>) -> Result<Vec<PlaylistItem>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&text).map_err(|e| Error::Config(format!("invalid playlist {}: {}", path.display(), e)))
}

/// Key of the instance bound to `slot` of item `item_id`
pub fn instance_key(item_id: &str, slot: &str) -> String {
    format!("{}-{}", item_id, slot)
}

#[derive(Default)]
struct PlaylistState {
    items: Vec<PlaylistItem>,
    instances: HashMap<String, Arc<CallbackInstance>>,
}

/// The rotation state machine
pub struct Playlist {
    registry: Arc<SourceRegistry>,
    composer: LayoutComposer,
    state: RwLock<Arc<PlaylistState>>,
    index: Mutex<usize>,
}

impl Playlist {
    /// An empty playlist; call [`register_instances`](Self::register_instances) to fill it.
    pub fn new(context: Arc<RenderContext>, registry: Arc<SourceRegistry>) -> Self {
        Self {
            registry,
            composer: LayoutComposer::new(context),
            state: RwLock::new(Arc::new(PlaylistState::default())),
            index: Mutex::new(0),
        }
    }

    fn context(&self) -> &Arc<RenderContext> {
        self.composer.context()
    }

    fn snapshot(&self) -> Arc<PlaylistState> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the item the next `tick` renders.
    pub fn current_index(&self) -> usize {
        *self.index.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn instance(&self, key: &str) -> Option<Arc<CallbackInstance>> {
        self.snapshot().instances.get(key).cloned()
    }

    /// Replace the playlist, building one instance per item slot.
    ///
    /// Nothing is replaced unless every instance builds; the rotation
    /// restarts at the first item.
    pub fn register_instances(&self, items: Vec<PlaylistItem>) -> Result<()> {
        let mut ids = HashSet::new();
        let mut instances = HashMap::new();

        for item in &items {
            if !ids.insert(item.id.as_str()) {
                return Err(Error::Config(format!("duplicate playlist item id '{}'", item.id)));
            }
            for slot in &item.slots {
                let key = instance_key(&item.id, &slot.name);
                let registered = self.registry.get(&slot.source)?;
                let instance = CallbackInstance::new(key.clone(), registered, &slot.options, self.context().clone())
                    .map_err(|e| Error::Config(format!("item '{}' slot '{}': {}", item.id, slot.name, e)))?;
                if instances.insert(key.clone(), Arc::new(instance)).is_some() {
                    return Err(Error::Config(format!("instance key '{}' is not unique", key)));
                }
            }
        }

        let count = instances.len();
        let new_state = Arc::new(PlaylistState { items, instances });
        {
            let mut index = self.index.lock().unwrap_or_else(|e| e.into_inner());
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            *state = new_state;
            *index = 0;
        }
        info!("Registered playlist with {} items and {} instances", self.len(), count);
        Ok(())
    }

    /// Render the current item and advance the rotation.
    pub async fn tick(&self, view: ViewType) -> RenderResponse {
        // index before state, the same order `register_instances` uses, so the
        // captured item and the stored index always belong to one playlist
        let (state, item) = {
            let mut index = self.index.lock().unwrap_or_else(|e| e.into_inner());
            let state = self.snapshot();
            let len = state.items.len();
            if len == 0 {
                return Error::EmptyPlaylist.into();
            }
            if *index >= len {
                let stale = std::mem::replace(&mut *index, 0);
                warn!("Rotation index {} out of range for {} items, restarting", stale, len);
                return RenderResponse::error(format!("rotation index {} is out of range for {} items", stale, len));
            }
            let item = state.items[*index].clone();
            *index = (*index + 1) % len;
            (state, item)
        };

        debug!("tick -> item '{}' ({})", item.id, view);
        self.render_item(&state, &item, view).await
    }

    /// Render an item by id without moving the rotation.
    pub async fn render_by_id(&self, item_id: &str, view: ViewType) -> RenderResponse {
        let state = self.snapshot();
        match state.items.iter().find(|i| i.id == item_id) {
            Some(item) => self.render_item(&state, item, view).await,
            None => Error::NotFound(item_id.to_string()).into(),
        }
    }

    async fn render_item(&self, state: &PlaylistState, item: &PlaylistItem, view: ViewType) -> RenderResponse {
        let mut instances = Vec::with_capacity(item.slots.len());
        for slot in &item.slots {
            let key = instance_key(&item.id, &slot.name);
            match state.instances.get(&key) {
                Some(instance) => instances.push(instance.clone()),
                None => return RenderResponse::error(format!("no instance registered for '{}'", key)),
            }
        }
        self.composer.compose(item, &instances, view).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_parse_with_split_alias() {
        let full: Layout = serde_json::from_str(r#""full""#).unwrap();
        let two: Layout = serde_json::from_str(r#""2-col""#).unwrap();
        let split: Layout = serde_json::from_str(r#""split""#).unwrap();
        assert_eq!(full.slot_count(), 1);
        assert_eq!(two, Layout::TwoCol);
        assert_eq!(split, Layout::TwoCol);
    }

    #[test]
    fn slots_as_object_keep_declaration_order() {
        let item: PlaylistItem = serde_json::from_str(
            r#"{
                "id": "morning",
                "layout": "2-col",
                "slots": {
                    "right": {"source": "weather", "options": {"city": "Oslo"}},
                    "left": {"source": "calendar"}
                }
            }"#,
        )
        .unwrap();
        let names: Vec<_> = item.slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["right", "left"]);
        assert_eq!(item.slots[1].options, Value::Null);
    }

    #[test]
    fn slots_as_list() {
        let item: PlaylistItem = serde_json::from_str(
            r#"{"id": "a", "layout": "full", "slots": [{"name": "main", "source": "static"}]}"#,
        )
        .unwrap();
        assert_eq!(item, PlaylistItem::full("a", "static", Value::Null));
    }

    fn static_playlist(dir: &std::path::Path) -> Playlist {
        use crate::renderer::RendererPool;
        use crate::storage::ArtifactStore;
        use crate::template::TemplatePaths;
        use crate::{JinjaEngine, ScreenSize};

        let paths = TemplatePaths::new(dir.join("templates"), dir.join("sources"));
        std::fs::create_dir_all(&paths.templates_dir).unwrap();
        std::fs::write(paths.global("generic"), "{{ data.item }}").unwrap();
        let context = RenderContext::new(
            Arc::new(JinjaEngine::new()),
            paths,
            Arc::new(RendererPool::new(Vec::new())),
            ArtifactStore::new(dir.join("output"), 0).unwrap(),
            ScreenSize::default(),
        );
        Playlist::new(Arc::new(context), Arc::new(SourceRegistry::with_builtin_sources()))
    }

    fn static_item(id: &str) -> PlaylistItem {
        PlaylistItem::full(id, "static", serde_json::json!({ "payload": { "item": id } }))
    }

    #[tokio::test]
    async fn out_of_range_index_restarts_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let playlist = static_playlist(dir.path());
        playlist.register_instances(vec![static_item("A"), static_item("B")]).unwrap();
        *playlist.index.lock().unwrap() = 5;

        match playlist.tick(ViewType::Json).await {
            RenderResponse::Error { message, .. } => assert!(message.contains("out of range"), "{}", message),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(playlist.current_index(), 0);
        assert_eq!(
            playlist.tick(ViewType::Json).await,
            RenderResponse::Json { json: serde_json::json!({"item": "A"}) }
        );
    }

    #[test]
    fn instance_keys() {
        assert_eq!(instance_key("morning", "left"), "morning-left");
    }
}
