use sqlx::FromRow;
use stax_core::ports::OwnerCredential;
use stax_core::types::Timestamp;

/// A row from the `user_tokens` table.
#[derive(Clone, FromRow)]
pub struct UserToken {
    pub user_uid: String,
    pub token: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<UserToken> for OwnerCredential {
    fn from(row: UserToken) -> Self {
        OwnerCredential {
            user_uid: row.user_uid,
            token: row.token,
        }
    }
}
