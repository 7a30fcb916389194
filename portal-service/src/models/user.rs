use super::{de, status_key, Normalize};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Agent,
    Client,
    Unknown,
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        match status_key(raw).as_str() {
            "ADMIN" | "SUPER_ADMIN" => Role::Admin,
            "AGENT" => Role::Agent,
            "CLIENT" | "CUSTOMER" => Role::Client,
            _ => Role::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
}

/// User record as served by `/api/users`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "full_name")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, alias = "is_active")]
    pub is_active: Option<bool>,
}

impl Normalize for RawUser {
    type Output = User;

    fn normalize(self) -> Option<User> {
        let email = self.email.unwrap_or_default();
        let full_name = self
            .full_name
            .or(self.name)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| email.clone());
        Some(User {
            id: self.id?,
            email,
            full_name,
            role: self.role.as_deref().map(Role::parse).unwrap_or(Role::Unknown),
            is_active: self.is_active.unwrap_or(true),
        })
    }
}
