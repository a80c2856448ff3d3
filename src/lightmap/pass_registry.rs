// src/lightmap/pass_registry.rs
// Explicit pass-name to pass-index registry handed to the geometry baker.
// RELEVANT FILES:src/lightmap/geometry_baker.rs,src/lightmap/incremental.rs

use std::collections::HashMap;

pub const BASE_PASS_INDEX: u32 = 0;
pub const ALPHA_PASS_INDEX: u32 = 1;
pub const MATERIAL_PASS_INDEX: u32 = 2;
pub const DEFERRED_PASS_INDEX: u32 = 3;
pub const LIGHT_PASS_INDEX: u32 = 4;
pub const LITBASE_PASS_INDEX: u32 = 5;
pub const LITALPHA_PASS_INDEX: u32 = 6;
pub const SHADOW_PASS_INDEX: u32 = 7;

const BUILTIN_PASSES: [(&str, u32); 8] = [
    ("base", BASE_PASS_INDEX),
    ("alpha", ALPHA_PASS_INDEX),
    ("material", MATERIAL_PASS_INDEX),
    ("deferred", DEFERRED_PASS_INDEX),
    ("light", LIGHT_PASS_INDEX),
    ("litbase", LITBASE_PASS_INDEX),
    ("litalpha", LITALPHA_PASS_INDEX),
    ("shadow", SHADOW_PASS_INDEX),
];

/// Case-insensitive pass registry. Unknown names are assigned the next free
/// index on first lookup, so indices stay stable for the registry's lifetime.
#[derive(Debug, Clone)]
pub struct PassRegistry {
    indices: HashMap<String, u32>,
    next_index: u32,
}

impl PassRegistry {
    pub fn new() -> Self {
        let indices: HashMap<String, u32> = BUILTIN_PASSES
            .iter()
            .map(|&(name, index)| (name.to_string(), index))
            .collect();
        Self {
            next_index: BUILTIN_PASSES.len() as u32,
            indices,
        }
    }

    /// Index of `name`, registering it when unseen
    pub fn index_of(&mut self, name: &str) -> u32 {
        let key = name.to_lowercase();
        if let Some(&index) = self.indices.get(&key) {
            return index;
        }
        let index = self.next_index;
        self.next_index += 1;
        self.indices.insert(key, index);
        log::debug!("Registered pass '{name}' as index {index}");
        index
    }

    /// Index of `name` without registering it
    pub fn get(&self, name: &str) -> Option<u32> {
        self.indices.get(&name.to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl Default for PassRegistry {
    fn default() -> Self {
        Self::new()
    }
}
