//! Session context — who is signed in to the portal, and as what.
//!
//! DESIGN
//! ======
//! Authentication is simulated: any non-blank username/password pair is
//! accepted for any role. The context holds at most one user; signing in
//! again replaces the previous session. Role-gated screens call
//! `require_role` instead of re-reading loose key/value state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ErrorCode;

pub const DEMO_PASSWORD: &str = "demo123";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("username and password are both required")]
    MissingCredentials,
    #[error("no user is signed in")]
    NotSignedIn,
    #[error("signed in as {actual}, but this requires {required}")]
    WrongRole { required: Role, actual: Role },
    #[error("unknown role '{0}'")]
    UnknownRole(String),
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "E_MISSING_CREDENTIALS",
            Self::NotSignedIn => "E_NOT_SIGNED_IN",
            Self::WrongRole { .. } => "E_WRONG_ROLE",
            Self::UnknownRole(_) => "E_UNKNOWN_ROLE",
        }
    }
}

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Parent,
    Pupil,
    Teacher,
    NonTeachingStaff,
    Guest,
    Admin,
}

impl Role {
    pub const ALL: [Self; 6] = [Self::Parent, Self::Pupil, Self::Teacher, Self::NonTeachingStaff, Self::Guest, Self::Admin];

    /// URL-safe identifier, e.g. `non-teaching-staff`.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Pupil => "pupil",
            Self::Teacher => "teacher",
            Self::NonTeachingStaff => "non-teaching-staff",
            Self::Guest => "guest",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Parent => "Parent",
            Self::Pupil => "Pupil",
            Self::Teacher => "Teacher",
            Self::NonTeachingStaff => "Non-Teaching Staff",
            Self::Guest => "Guest",
            Self::Admin => "Admin",
        }
    }

    #[must_use]
    pub fn dashboard_path(self) -> String {
        format!("/dashboard/{}", self.slug())
    }

    /// Username of the demo account for this role. The password is always
    /// [`DEMO_PASSWORD`].
    #[must_use]
    pub fn demo_username(self) -> &'static str {
        match self {
            Self::Parent => "parent_demo",
            Self::Pupil => "pupil_demo",
            Self::Teacher => "teacher_demo",
            Self::NonTeachingStaff => "staff_demo",
            Self::Guest => "guest_demo",
            Self::Admin => "admin_demo",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Role {
    type Err = SessionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.slug().eq_ignore_ascii_case(raw))
            .ok_or_else(|| SessionError::UnknownRole(raw.to_string()))
    }
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub username: String,
    pub role: Role,
}

impl SessionUser {
    /// Avatar initials: first two characters of the first `_`-separated
    /// segment, uppercased. `U` when there is nothing to take.
    #[must_use]
    pub fn initials(&self) -> String {
        let head = self.username.split_once('_').map_or(self.username.as_str(), |(head, _)| head);
        let initials: String = head.chars().take(2).collect::<String>().to_uppercase();
        if initials.is_empty() { "U".to_string() } else { initials }
    }
}

#[derive(Debug, Default)]
pub struct SessionContext {
    user: Option<SessionUser>,
}

impl SessionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign in, replacing any existing session.
    ///
    /// # Errors
    ///
    /// `MissingCredentials` if either field is blank.
    pub fn login(&mut self, role: Role, username: &str, password: &str) -> Result<&SessionUser, SessionError> {
        let username = username.trim();
        if username.is_empty() || password.trim().is_empty() {
            return Err(SessionError::MissingCredentials);
        }
        info!(%role, username, "signed in");
        Ok(&*self.user.insert(SessionUser { username: username.to_string(), role }))
    }

    /// Sign out. Returns the user who was signed in, if any.
    pub fn logout(&mut self) -> Option<SessionUser> {
        let previous = self.user.take();
        if let Some(user) = &previous {
            info!(role = %user.role, username = %user.username, "signed out");
        }
        previous
    }

    #[must_use]
    pub fn current(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    /// The signed-in user, if they hold `role`.
    ///
    /// # Errors
    ///
    /// `NotSignedIn` when nobody is signed in; `WrongRole` otherwise.
    pub fn require_role(&self, role: Role) -> Result<&SessionUser, SessionError> {
        let user = self.user.as_ref().ok_or(SessionError::NotSignedIn)?;
        if user.role == role {
            Ok(user)
        } else {
            Err(SessionError::WrongRole { required: role, actual: user.role })
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
