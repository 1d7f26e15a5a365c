//! Authentication user types.

use serde::Serialize;

use crate::db::Rank;
use crate::jwt::{Claims, IssuedToken};
use crate::permissions::Requester;

/// The resolved user of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub subject_id: String,
    pub rank: Rank,
}

impl Identity {
    pub fn requester(&self) -> Requester<'_> {
        Requester {
            id: &self.subject_id,
            rank: self.rank,
        }
    }
}

impl From<&Claims> for Identity {
    fn from(claims: &Claims) -> Self {
        Self {
            subject_id: claims.sub.clone(),
            rank: claims.rank,
        }
    }
}

/// Outcome of resolving the session cookies of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No usable session
    Anonymous,
    /// Valid, unexpired access token
    Authenticated(Identity),
    /// Access token expired and was re-issued from the refresh token
    Rotated {
        identity: Identity,
        access_token: IssuedToken,
    },
}
