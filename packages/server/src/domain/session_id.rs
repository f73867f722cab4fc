//! Session id value object.

use std::{borrow::Borrow, fmt};

use super::error::SessionIdError;

/// Longest id accepted from the wire. Generated ids are far shorter.
const MAX_SESSION_ID_LEN: usize = 128;

/// Opaque token identifying one logical connection across physical requests.
///
/// Ids are generated by [`SessionIdFactory`] and are never reused during the
/// lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an existing id, validating its shape.
    pub fn new(value: String) -> Result<Self, SessionIdError> {
        if value.is_empty() {
            return Err(SessionIdError::Empty);
        }
        if value.len() > MAX_SESSION_ID_LEN {
            return Err(SessionIdError::TooLong {
                max: MAX_SESSION_ID_LEN,
                actual: value.len(),
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

// Lets the connection map be queried with the raw `&str` from a request body.
impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates fresh, high-entropy session ids.
pub struct SessionIdFactory;

impl SessionIdFactory {
    /// Generate a new random session id (UUID v4, simple format).
    pub fn generate() -> SessionId {
        SessionId(uuid::Uuid::new_v4().simple().to_string())
    }
}
