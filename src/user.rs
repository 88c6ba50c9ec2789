//! Identifies the user that a request acts on behalf of.

use serde::{Deserialize, Serialize};

use crate::database_id::UserId;

/// The query string `?userId=<id>` carried by every user-scoped route.
///
/// Authentication happens in front of this service, which trusts the user ID
/// it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    /// The ID of the user that owns the requested resources.
    pub user_id: UserId,
}
