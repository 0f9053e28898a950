use crate::database::models::{ReactionKind, ReactionTally};
use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteReactionRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn kind_of(conn: &Connection, comment_id: &str, user_id: &str) -> Result<Option<ReactionKind>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT kind FROM reactions WHERE comment_id = ?1 AND user_id = ?2",
            params![comment_id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|raw| {
        ReactionKind::parse(&raw).ok_or_else(|| anyhow!("unknown reaction kind: {raw}"))
    })
    .transpose()
}

fn tally_of(conn: &Connection, comment_id: &str) -> Result<ReactionTally> {
    let count = |kind: ReactionKind| -> Result<usize> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM reactions WHERE comment_id = ?1 AND kind = ?2",
            params![comment_id, kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    };
    Ok(ReactionTally {
        likes: count(ReactionKind::Like)?,
        dislikes: count(ReactionKind::Dislike)?,
    })
}

impl<'conn> super::ReactionRepository for SqliteReactionRepository<'conn> {
    fn reaction_of(&self, comment_id: &str, user_id: &str) -> Result<Option<ReactionKind>> {
        kind_of(self.conn, comment_id, user_id)
    }

    fn toggle(
        &self,
        comment_id: &str,
        user_id: &str,
        kind: ReactionKind,
        created_at: &str,
    ) -> Result<ReactionTally> {
        let tx = self.conn.unchecked_transaction()?;
        let previous = kind_of(&tx, comment_id, user_id)?;
        tx.execute(
            "DELETE FROM reactions WHERE comment_id = ?1 AND user_id = ?2",
            params![comment_id, user_id],
        )?;
        if previous != Some(kind) {
            tx.execute(
                r#"
                INSERT INTO reactions (comment_id, user_id, kind, created_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![comment_id, user_id, kind.as_str(), created_at],
            )?;
        }
        let tally = tally_of(&tx, comment_id)?;
        tx.commit()?;
        Ok(tally)
    }

    fn tally(&self, comment_id: &str) -> Result<ReactionTally> {
        tally_of(self.conn, comment_id)
    }
}
