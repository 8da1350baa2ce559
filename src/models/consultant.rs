use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

use super::Identified;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Consultant {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    #[serde(alias = "fullName", alias = "full_name", default)]
    pub name: String,

    #[serde(default)]
    pub specialty: Option<String>,

    #[serde(alias = "avatarUrl", default)]
    pub avatar: Option<String>,
}

impl Identified for Consultant {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Service {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    #[serde(default)]
    pub name: String,
}

impl Identified for Service {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Author of a feedback entry or owner of a quiz result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Account {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    #[serde(alias = "fullName", alias = "full_name", default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,
}

impl Identified for Account {
    fn id(&self) -> &str {
        &self.id
    }
}
