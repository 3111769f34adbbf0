use serde::{Deserialize, Serialize};

/// Owner (user) of a marble.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub username: String,
    pub company: String,
}

impl Owner {
    pub fn new(id: &str, username: &str, company: &str) -> Self {
        Self {
            id: id.to_string(),
            username: username.to_string(),
            company: company.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marble {
    pub id: String,
    pub color: String,
    /// Size in mm.
    pub size: u32,
    pub owner: Owner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<String>,
}

/// Ownership transfer request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub marble_id: String,
    pub to_owner_id: String,
    /// Company of the current owner.
    pub auth_company: String,
}

/// Reply to an entity creation or transfer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Entity id (owner or marble).
    pub id: String,
    pub tx_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearMarblesResponse {
    #[serde(default)]
    pub tx_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub found: usize,
    pub deleted: usize,
}
