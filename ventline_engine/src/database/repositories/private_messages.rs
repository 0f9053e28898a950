use crate::database::models::PrivateMessageRecord;
use anyhow::Result;
use rusqlite::{params, Connection, Row};

pub(super) struct SqlitePrivateMessageRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const SELECT_COLUMNS: &str = "id, sender_id, receiver_id, content, created_at, is_read";

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<PrivateMessageRecord> {
    Ok(PrivateMessageRecord {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        is_read: row.get(5)?,
    })
}

impl<'conn> super::PrivateMessageRepository for SqlitePrivateMessageRepository<'conn> {
    fn create(&self, record: &PrivateMessageRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO private_messages (id, sender_id, receiver_id, content, created_at, is_read)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.sender_id,
                record.receiver_id,
                record.content,
                record.created_at,
                record.is_read,
            ],
        )?;
        Ok(())
    }

    fn list_for_receiver(
        &self,
        receiver_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PrivateMessageRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM private_messages
            WHERE receiver_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2 OFFSET ?3
            "#
        ))?;
        let rows = stmt.query_map(params![receiver_id, limit, offset], row_to_message)?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    fn count_for_receiver(&self, receiver_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM private_messages WHERE receiver_id = ?1",
            params![receiver_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn count_unread(&self, receiver_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM private_messages WHERE receiver_id = ?1 AND is_read = 0",
            params![receiver_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn mark_all_read(&self, receiver_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE private_messages SET is_read = 1 WHERE receiver_id = ?1",
            params![receiver_id],
        )?;
        Ok(())
    }

    fn count_total(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM private_messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
