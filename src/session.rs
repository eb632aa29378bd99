use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::SenderRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Tenant,
    Owner,
}

impl UserRole {
    pub fn sender(self) -> SenderRole {
        match self {
            UserRole::Tenant => SenderRole::Tenant,
            UserRole::Owner => SenderRole::Owner,
        }
    }
}

/// Who is signed in. The e-mail is the identity key across every collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub name: String,
    pub phone: String,
    pub role: UserRole,
}

impl Identity {
    pub fn new(email: &str, name: &str, phone: &str, role: UserRole) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            phone: phone.into(),
            role,
        }
    }
}

/// Current-user context, handed to every operation that acts on behalf of
/// someone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    identity: Option<Identity>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    /// The signed-in identity, or `NotAuthenticated`. A blank e-mail counts
    /// as signed out.
    pub fn identity(&self) -> Result<&Identity> {
        self.identity
            .as_ref()
            .filter(|id| !id.email.trim().is_empty())
            .ok_or(Error::NotAuthenticated)
    }

    pub fn email(&self) -> Result<&str> {
        self.identity().map(|id| id.email.as_str())
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity().is_ok()
    }

    pub fn sign_out(&mut self) {
        self.identity = None;
    }
}
