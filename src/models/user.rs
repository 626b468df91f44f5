use serde::{Deserialize, Serialize};

use super::ids::UserId;

/// User as announced to other services on `user.user`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub deleted: bool,
}
