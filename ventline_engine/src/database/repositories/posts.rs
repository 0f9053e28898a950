use crate::database::models::{MediaKind, MediaRef, PostRecord};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqlitePostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const SELECT_COLUMNS: &str = "id, author_id, content, category, media_kind, media_ref, \
     created_at, approved, approved_by, mirror_handle";

fn row_to_post(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    let media_kind: Option<String> = row.get(4)?;
    let media_ref: Option<String> = row.get(5)?;
    let media = match (media_kind, media_ref) {
        (Some(kind), Some(file_ref)) => MediaKind::parse(&kind).map(|kind| MediaRef {
            kind,
            file_ref,
        }),
        _ => None,
    };
    Ok(PostRecord {
        id: row.get(0)?,
        author_id: row.get(1)?,
        content: row.get(2)?,
        category: row.get(3)?,
        media,
        created_at: row.get(6)?,
        approved: row.get(7)?,
        approved_by: row.get(8)?,
        mirror_handle: row.get(9)?,
    })
}

impl<'conn> super::PostRepository for SqlitePostRepository<'conn> {
    fn create(&self, record: &PostRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO posts (id, author_id, content, category, media_kind, media_ref,
                               created_at, approved, approved_by, mirror_handle)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                record.id,
                record.author_id,
                record.content,
                record.category,
                record.media.as_ref().map(|m| m.kind.as_str()),
                record.media.as_ref().map(|m| m.file_ref.as_str()),
                record.created_at,
                record.approved,
                record.approved_by,
                record.mirror_handle,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PostRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM posts WHERE id = ?1"),
                params![id],
                row_to_post,
            )
            .optional()?)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn mark_approved(&self, id: &str, approved_by: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE posts SET approved = 1, approved_by = ?1 WHERE id = ?2",
            params![approved_by, id],
        )?;
        Ok(())
    }

    fn set_mirror_handle(&self, id: &str, handle: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE posts SET mirror_handle = ?1 WHERE id = ?2 AND mirror_handle IS NULL",
            params![handle, id],
        )?;
        Ok(changed > 0)
    }

    fn list_pending(&self, limit: usize) -> Result<Vec<PostRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM posts
            WHERE approved = 0
            ORDER BY created_at ASC, rowid ASC
            LIMIT ?1
            "#
        ))?;
        let rows = stmt.query_map(params![limit], row_to_post)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    fn list_recent_approved(&self, limit: usize) -> Result<Vec<PostRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM posts
            WHERE approved = 1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?1
            "#
        ))?;
        let rows = stmt.query_map(params![limit], row_to_post)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    fn count_pending(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE approved = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn count_approved(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE approved = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
