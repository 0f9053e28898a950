use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteFollowRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::FollowRepository for SqliteFollowRepository<'conn> {
    fn follow(&self, follower_id: &str, followed_id: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR IGNORE INTO follows (follower_id, followed_id)
            VALUES (?1, ?2)
            "#,
            params![follower_id, followed_id],
        )?;
        Ok(())
    }

    fn unfollow(&self, follower_id: &str, followed_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
            params![follower_id, followed_id],
        )?;
        Ok(())
    }

    fn is_following(&self, follower_id: &str, followed_id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
            params![follower_id, followed_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn count_followers(&self, followed_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE followed_id = ?1",
            params![followed_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
