use crate::database::models::LeaderboardEntry;
use anyhow::Result;
use rusqlite::{params, Connection, Row};

pub(super) struct SqliteRatingRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

/// Scores are always derived from post and comment rows; nothing here is
/// cached, so the figures cannot drift from the source of truth.
const LEADERBOARD_QUERY: &str = r#"
    SELECT u.id, u.anonymous_name, u.display_tag,
           (SELECT COUNT(*) FROM posts p WHERE p.author_id = u.id AND p.approved = 1) +
           (SELECT COUNT(*) FROM comments c WHERE c.author_id = u.id) AS total
    FROM users u
    ORDER BY total DESC, u.created_at ASC, u.rowid ASC
"#;

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<LeaderboardEntry> {
    Ok(LeaderboardEntry {
        user_id: row.get(0)?,
        anonymous_name: row.get(1)?,
        display_tag: row.get(2)?,
        score: row.get(3)?,
    })
}

impl<'conn> super::RatingRepository for SqliteRatingRepository<'conn> {
    fn score(&self, user_id: &str) -> Result<i64> {
        let score: i64 = self.conn.query_row(
            r#"
            SELECT (SELECT COUNT(*) FROM posts WHERE author_id = ?1 AND approved = 1) +
                   (SELECT COUNT(*) FROM comments WHERE author_id = ?1)
            "#,
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(score)
    }

    fn rank(&self, user_id: &str) -> Result<Option<usize>> {
        let mut stmt = self.conn.prepare(LEADERBOARD_QUERY)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for (index, row) in rows.enumerate() {
            if row? == user_id {
                return Ok(Some(index + 1));
            }
        }
        Ok(None)
    }

    fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LEADERBOARD_QUERY} LIMIT ?1"))?;
        let rows = stmt.query_map(params![limit], row_to_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
