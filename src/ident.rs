//! Opaque entity identifiers.
//!
//! Identifiers have the shape `<type-prefix>_<32 hex digits>`. They are minted
//! once per entity from 128 random bits and carry no semantic meaning; the
//! natural key is the only way to find an entity again.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::vocab::EntityType;

/// Local name of an entity node (the part after the ontology namespace).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wrap an existing local name, e.g. one decoded from a query result.
    pub fn new(local_name: impl Into<String>) -> Self {
        Self(local_name.into())
    }

    /// Mint a fresh identifier for an entity of the given type.
    pub fn mint(entity_type: EntityType) -> Self {
        let bits: u128 = rand::random();
        Self(format!("{}_{bits:032x}", entity_type.id_prefix()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl From<&EntityId> for String {
    fn from(id: &EntityId) -> Self {
        id.0.clone()
    }
}
