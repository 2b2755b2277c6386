use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use super::uuid_at;
use crate::Database;
use crate::models::TokenPurpose;

impl Database {
    /// Records a mailed token for `user`, replacing any earlier token with
    /// the same purpose.
    pub fn issue_account_token(
        &self,
        user: Uuid,
        purpose: TokenPurpose,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM account_tokens WHERE user_id = ?1 AND purpose = ?2",
                params![user.to_string(), purpose.as_str()],
            )?;
            tx.execute(
                "INSERT INTO account_tokens (token_hash, user_id, purpose, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![token_hash, user.to_string(), purpose.as_str(), expires_at],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Deletes the token and returns its user, if it existed for `purpose`
    /// and had not expired. A token can be consumed at most once.
    pub fn consume_account_token(
        &self,
        purpose: TokenPurpose,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>> {
        self.with_conn_mut(|conn| {
            let consumed = conn
                .query_row(
                    "DELETE FROM account_tokens
                     WHERE token_hash = ?1 AND purpose = ?2
                     RETURNING user_id, expires_at",
                    params![token_hash, purpose.as_str()],
                    |row| Ok((uuid_at(row, 0)?, row.get::<_, DateTime<Utc>>(1)?)),
                )
                .optional()?;

            Ok(consumed.and_then(|(user, expires_at)| (expires_at > now).then_some(user)))
        })
    }

    /// Sets a new password, ends every session and voids outstanding
    /// reset tokens.
    pub fn reset_password(&self, user: Uuid, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE users
                 SET password = ?2, refresh_token_hash = NULL,
                     updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
                 WHERE id = ?1",
                params![user.to_string(), password_hash],
            )?;
            tx.execute(
                "DELETE FROM account_tokens WHERE user_id = ?1 AND purpose = ?2",
                params![user.to_string(), TokenPurpose::ResetPassword.as_str()],
            )?;
            tx.commit()?;
            Ok(())
        })
    }
}
