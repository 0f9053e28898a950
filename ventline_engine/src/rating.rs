use crate::database::models::LeaderboardEntry;
use crate::database::repositories::{RatingRepository, UserRepository};
use crate::database::Database;
use crate::error::{EngineError, EngineResult};

/// Contribution scoring. A user's score is their approved posts plus their
/// comments (replies count the same as top-level comments), recomputed from
/// repository state on every call.
#[derive(Clone)]
pub struct RatingEngine {
    database: Database,
}

impl RatingEngine {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn score(&self, user_id: &str) -> EngineResult<i64> {
        self.database.with_repositories(|repos| -> EngineResult<i64> {
            if repos.users().get(user_id)?.is_none() {
                return Err(EngineError::UserNotFound(user_id.to_string()));
            }
            Ok(repos.rating().score(user_id)?)
        })
    }

    /// 1-based leaderboard position; `None` for unknown users. Stable: the
    /// same repository state always yields the same rank, with ties broken
    /// by user creation order.
    pub fn rank(&self, user_id: &str) -> EngineResult<Option<usize>> {
        self.database
            .with_repositories(|repos| -> EngineResult<Option<usize>> {
                Ok(repos.rating().rank(user_id)?)
            })
    }

    pub fn leaderboard(&self, limit: usize) -> EngineResult<Vec<LeaderboardEntry>> {
        self.database
            .with_repositories(|repos| -> EngineResult<Vec<LeaderboardEntry>> {
                Ok(repos.rating().leaderboard(limit)?)
            })
    }
}
