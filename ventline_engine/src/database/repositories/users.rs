use crate::database::models::{PendingAction, UserRecord};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteUserRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<(UserRecord, String)> {
    let pending_raw: String = row.get(6)?;
    Ok((
        UserRecord {
            id: row.get(0)?,
            anonymous_name: row.get(1)?,
            display_tag: row.get(2)?,
            notifications_enabled: row.get(3)?,
            privacy_public: row.get(4)?,
            is_admin: row.get(5)?,
            pending_action: PendingAction::None,
            created_at: row.get(7)?,
        },
        pending_raw,
    ))
}

fn decode_user(pair: (UserRecord, String)) -> Result<UserRecord> {
    let (mut user, pending_raw) = pair;
    user.pending_action = serde_json::from_str(&pending_raw)
        .with_context(|| format!("invalid pending_action payload for user {}", user.id))?;
    Ok(user)
}

const SELECT_COLUMNS: &str = "id, anonymous_name, display_tag, notifications_enabled, \
     privacy_public, is_admin, pending_action, created_at";

impl<'conn> super::UserRepository for SqliteUserRepository<'conn> {
    fn create(&self, record: &UserRecord) -> Result<()> {
        let pending = serde_json::to_string(&record.pending_action)?;
        self.conn.execute(
            r#"
            INSERT INTO users (id, anonymous_name, display_tag, notifications_enabled,
                               privacy_public, is_admin, pending_action, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.id,
                record.anonymous_name,
                record.display_tag,
                record.notifications_enabled,
                record.privacy_public,
                record.is_admin,
                pending,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<UserRecord>> {
        let pair = self
            .conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                row_to_user,
            )
            .optional()?;
        pair.map(decode_user).transpose()
    }

    fn get_by_name(&self, anonymous_name: &str) -> Result<Option<UserRecord>> {
        let pair = self
            .conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM users WHERE anonymous_name = ?1"),
                params![anonymous_name],
                row_to_user,
            )
            .optional()?;
        pair.map(decode_user).transpose()
    }

    fn set_name(&self, id: &str, name: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET anonymous_name = ?1 WHERE id = ?2",
            params![name, id],
        )?;
        Ok(())
    }

    fn set_display_tag(&self, id: &str, tag: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET display_tag = ?1 WHERE id = ?2",
            params![tag, id],
        )?;
        Ok(())
    }

    fn set_notifications_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET notifications_enabled = ?1 WHERE id = ?2",
            params![enabled, id],
        )?;
        Ok(())
    }

    fn set_privacy_public(&self, id: &str, public: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET privacy_public = ?1 WHERE id = ?2",
            params![public, id],
        )?;
        Ok(())
    }

    fn pending_action(&self, id: &str) -> Result<Option<PendingAction>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT pending_action FROM users WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|raw| {
            serde_json::from_str(&raw)
                .with_context(|| format!("invalid pending_action payload for user {id}"))
        })
        .transpose()
    }

    fn store_pending_action(&self, id: &str, action: &PendingAction) -> Result<()> {
        let encoded = serde_json::to_string(action)?;
        self.conn.execute(
            "UPDATE users SET pending_action = ?1 WHERE id = ?2",
            params![encoded, id],
        )?;
        Ok(())
    }

    fn swap_pending_action(
        &self,
        id: &str,
        next: &PendingAction,
    ) -> Result<Option<PendingAction>> {
        // Read and replace under the connection lock held by the caller;
        // no other writer can interleave between the two statements.
        let previous = self.pending_action(id)?;
        if previous.is_some() {
            self.store_pending_action(id, next)?;
        }
        Ok(previous)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
