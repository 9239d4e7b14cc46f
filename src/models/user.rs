//! User model.

use serde::{Deserialize, Serialize};

use crate::errors::DataResult;

/// Privilege level of a user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Normal,
    Family,
    Admin,
}

impl Role {
    pub fn as_i32(&self) -> i32 {
        match self {
            Role::Normal => 0,
            Role::Family => 1,
            Role::Admin => 2,
        }
    }

    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Role::Family,
            2 => Role::Admin,
            _ => Role::Normal,
        }
    }

    /// Whether this role may see items that are not public.
    pub fn can_view_private(&self) -> bool {
        matches!(self, Role::Family | Role::Admin)
    }
}

/// Credential state of a user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum UserState {
    /// Created with a generated password that must be changed
    #[default]
    New,
    /// Password chosen by the user
    Set,
    Error,
}

impl UserState {
    pub fn as_i32(&self) -> i32 {
        match self {
            UserState::New => 0,
            UserState::Set => 1,
            UserState::Error => 2,
        }
    }

    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => UserState::New,
            1 => UserState::Set,
            _ => UserState::Error,
        }
    }
}

/// A catalog user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub role: Role,
    pub state: UserState,
    #[serde(skip_serializing)]
    pub hash: String,
    #[serde(skip_serializing)]
    pub salt: String,
    /// Free-form per-user settings, stored as a JSON document
    #[serde(default)]
    pub config: String,
}

impl User {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
            state: UserState::New,
            hash: String::new(),
            salt: String::new(),
            config: String::new(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Parse `config`; an empty column reads as an empty object.
    pub fn config_json(&self) -> DataResult<serde_json::Value> {
        if self.config.trim().is_empty() {
            return Ok(serde_json::Value::Object(Default::default()));
        }
        Ok(serde_json::from_str(&self.config)?)
    }
}
