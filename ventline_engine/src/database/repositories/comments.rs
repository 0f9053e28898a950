use crate::database::models::{CommentRecord, MediaKind, MediaRef};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteCommentRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const SELECT_COLUMNS: &str =
    "id, post_id, parent_comment_id, author_id, content, media_kind, media_ref, created_at";

fn row_to_comment(row: &Row<'_>) -> rusqlite::Result<CommentRecord> {
    let media_kind: Option<String> = row.get(5)?;
    let media_ref: Option<String> = row.get(6)?;
    let media = match (media_kind, media_ref) {
        (Some(kind), Some(file_ref)) => MediaKind::parse(&kind).map(|kind| MediaRef {
            kind,
            file_ref,
        }),
        _ => None,
    };
    Ok(CommentRecord {
        id: row.get(0)?,
        post_id: row.get(1)?,
        parent_comment_id: row.get(2)?,
        author_id: row.get(3)?,
        content: row.get(4)?,
        media,
        created_at: row.get(7)?,
    })
}

impl<'conn> super::CommentRepository for SqliteCommentRepository<'conn> {
    fn create(&self, record: &CommentRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO comments (id, post_id, parent_comment_id, author_id, content,
                                  media_kind, media_ref, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.id,
                record.post_id,
                record.parent_comment_id,
                record.author_id,
                record.content,
                record.media.as_ref().map(|m| m.kind.as_str()),
                record.media.as_ref().map(|m| m.file_ref.as_str()),
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<CommentRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM comments WHERE id = ?1"),
                params![id],
                row_to_comment,
            )
            .optional()?)
    }

    fn list_top_level(
        &self,
        post_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CommentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM comments
            WHERE post_id = ?1 AND parent_comment_id IS NULL
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2 OFFSET ?3
            "#
        ))?;
        let rows = stmt.query_map(params![post_id, limit, offset], row_to_comment)?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    fn list_replies(
        &self,
        parent_comment_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CommentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM comments
            WHERE parent_comment_id = ?1
            ORDER BY created_at ASC, rowid ASC
            LIMIT ?2 OFFSET ?3
            "#
        ))?;
        let rows = stmt.query_map(params![parent_comment_id, limit, offset], row_to_comment)?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    fn top_level_ids(&self, post_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id FROM comments
            WHERE post_id = ?1 AND parent_comment_id IS NULL
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;
        let rows = stmt.query_map(params![post_id], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn child_ids(&self, parent_comment_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id FROM comments
            WHERE parent_comment_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;
        let rows = stmt.query_map(params![parent_comment_id], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn count_for_post(&self, post_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn count_total(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
