use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteBlockRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::BlockRepository for SqliteBlockRepository<'conn> {
    fn block(&self, blocker_id: &str, blocked_id: &str, created_at: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR IGNORE INTO blocks (blocker_id, blocked_id, created_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![blocker_id, blocked_id, created_at],
        )?;
        Ok(())
    }

    fn unblock(&self, blocker_id: &str, blocked_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM blocks WHERE blocker_id = ?1 AND blocked_id = ?2",
            params![blocker_id, blocked_id],
        )?;
        Ok(())
    }

    fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM blocks WHERE blocker_id = ?1 AND blocked_id = ?2",
            params![blocker_id, blocked_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
