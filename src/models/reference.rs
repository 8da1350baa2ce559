use serde::{Deserialize, Serialize};

/// Anything the upstream API may either embed or reference by id.
pub trait Identified {
    fn id(&self) -> &str;
}

/// A reference to another upstream entity.
///
/// The booking API returns the same field either as a bare id string or as a
/// populated object, depending on the endpoint. `Ref::id` is always present;
/// the entity itself (and therefore any display name) only when populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ref<T> {
    Populated(T),
    Id(String),
}

impl<T: Identified> Ref<T> {
    pub fn id(&self) -> &str {
        match self {
            Ref::Populated(entity) => entity.id(),
            Ref::Id(id) => id,
        }
    }

    pub fn populated(&self) -> Option<&T> {
        match self {
            Ref::Populated(entity) => Some(entity),
            Ref::Id(_) => None,
        }
    }
}
