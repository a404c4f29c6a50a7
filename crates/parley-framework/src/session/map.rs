//! A schemaless session value.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SessionData;
use crate::scene::SceneSlot;

const SCENE_KEY: &str = "scene";

/// A string-keyed map of JSON values, for sessions without a dedicated type.
///
/// The active scene name, when used with
/// [`SceneManager::session_backed`](crate::scene::SceneManager::session_backed),
/// is kept under the `"scene"` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionMap(BTreeMap<String, Value>);

impl SessionMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `key` as a `V`. Missing keys and values of another shape give
    /// `None`.
    pub fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        self.0
            .get(key)
            .and_then(|value| V::deserialize(value).ok())
    }

    /// Stores `value` under `key`.
    pub fn set<V: Serialize>(&mut self, key: impl Into<String>, value: V) -> serde_json::Result<()> {
        self.0.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Removes `key`, returning its raw value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the map holds no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl SessionData for SessionMap {
    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl SceneSlot for SessionMap {
    fn scene(&self) -> Option<&str> {
        self.0.get(SCENE_KEY).and_then(Value::as_str)
    }

    fn set_scene(&mut self, scene: Option<String>) {
        match scene {
            Some(name) => {
                self.0.insert(SCENE_KEY.to_string(), Value::String(name));
            }
            None => {
                self.0.remove(SCENE_KEY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let mut map = SessionMap::new();
        map.set("visits", 3_u32).unwrap();
        map.set("name", "ada").unwrap();

        assert_eq!(map.get::<u32>("visits"), Some(3));
        assert_eq!(map.get::<String>("name").as_deref(), Some("ada"));
        assert_eq!(map.get::<u32>("name"), None);
        assert_eq!(map.get::<u32>("missing"), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let mut map = SessionMap::new();
        map.set("a", 1).unwrap();
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"a":1}"#);

        let back: SessionMap = serde_json::from_str(r#"{"b":true}"#).unwrap();
        assert_eq!(back.get::<bool>("b"), Some(true));
    }

    #[test]
    fn test_scene_slot() {
        let mut map = SessionMap::new();
        assert_eq!(map.scene(), None);

        map.set_scene(Some("form".into()));
        assert_eq!(map.scene(), Some("form"));
        assert!(!SessionData::is_empty(&map));

        map.set_scene(None);
        assert!(map.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut map = SessionMap::new();
        map.set("a", 1).unwrap();
        map.set("b", 2).unwrap();
        assert_eq!(map.remove("a"), Some(Value::from(1)));
        assert!(map.contains_key("b"));
        map.clear();
        assert!(map.is_empty());
    }
}
