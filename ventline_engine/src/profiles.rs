use crate::database::models::{PendingAction, UserRecord};
use crate::database::repositories::{
    BlockRepository, FollowRepository, RatingRepository, UserRepository,
};
use crate::database::Database;
use crate::error::{EngineError, EngineResult};
use crate::utils::{now_utc_iso, MAX_NAME_LEN};
use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub user_id: String,
    pub anonymous_name: String,
    pub display_tag: String,
    pub followers: usize,
    pub score: i64,
}

/// User bootstrap, profile edits, follows and blocks.
#[derive(Clone)]
pub struct ProfileService {
    database: Database,
    admin_user_id: Option<String>,
}

impl ProfileService {
    pub fn new(database: Database, admin_user_id: Option<String>) -> Self {
        Self {
            database,
            admin_user_id,
        }
    }

    /// Fetches the user, creating the row on first interaction with a
    /// generated anonymous name. The configured admin id receives the admin
    /// flag here.
    pub fn ensure_user(&self, user_id: &str) -> EngineResult<UserRecord> {
        self.database
            .with_repositories(|repos| -> EngineResult<UserRecord> {
                let users = repos.users();
                if let Some(existing) = users.get(user_id)? {
                    return Ok(existing);
                }
                let record = UserRecord {
                    id: user_id.to_string(),
                    anonymous_name: generate_anonymous_name(&users)?,
                    display_tag: String::new(),
                    notifications_enabled: true,
                    privacy_public: true,
                    is_admin: self.admin_user_id.as_deref() == Some(user_id),
                    pending_action: PendingAction::None,
                    created_at: now_utc_iso(),
                };
                users.create(&record)?;
                tracing::info!(user_id, name = %record.anonymous_name, "new user bootstrapped");
                Ok(record)
            })
    }

    pub fn profile(&self, user_id: &str) -> EngineResult<ProfileView> {
        self.database
            .with_repositories(|repos| -> EngineResult<ProfileView> {
                let user = repos
                    .users()
                    .get(user_id)?
                    .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))?;
                let followers = repos.follows().count_followers(user_id)?;
                let score = repos.rating().score(user_id)?;
                Ok(ProfileView {
                    user_id: user.id,
                    anonymous_name: user.anonymous_name,
                    display_tag: user.display_tag,
                    followers,
                    score,
                })
            })
    }

    pub fn rename(&self, user_id: &str, new_name: &str) -> EngineResult<UserRecord> {
        let name = new_name.trim();
        if name.is_empty() {
            return Err(EngineError::EmptyContent);
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(EngineError::OversizedInput {
                length: name.chars().count(),
                limit: MAX_NAME_LEN,
            });
        }
        self.database
            .with_repositories(|repos| -> EngineResult<UserRecord> {
                let users = repos.users();
                let mut user = users
                    .get(user_id)?
                    .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))?;
                users.set_name(user_id, name)?;
                user.anonymous_name = name.to_string();
                Ok(user)
            })
    }

    pub fn set_display_tag(&self, user_id: &str, tag: &str) -> EngineResult<()> {
        self.database
            .with_repositories(|repos| -> EngineResult<()> {
                let users = repos.users();
                if users.get(user_id)?.is_none() {
                    return Err(EngineError::UserNotFound(user_id.to_string()));
                }
                users.set_display_tag(user_id, tag)?;
                Ok(())
            })
    }

    /// Flips the notification preference; returns the new value.
    pub fn toggle_notifications(&self, user_id: &str) -> EngineResult<bool> {
        self.database
            .with_repositories(|repos| -> EngineResult<bool> {
                let users = repos.users();
                let user = users
                    .get(user_id)?
                    .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))?;
                let next = !user.notifications_enabled;
                users.set_notifications_enabled(user_id, next)?;
                Ok(next)
            })
    }

    /// Flips the privacy preference; returns the new value.
    pub fn toggle_privacy(&self, user_id: &str) -> EngineResult<bool> {
        self.database
            .with_repositories(|repos| -> EngineResult<bool> {
                let users = repos.users();
                let user = users
                    .get(user_id)?
                    .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))?;
                let next = !user.privacy_public;
                users.set_privacy_public(user_id, next)?;
                Ok(next)
            })
    }

    pub fn follow(&self, follower_id: &str, followed_id: &str) -> EngineResult<()> {
        self.database
            .with_repositories(|repos| -> EngineResult<()> {
                if repos.users().get(followed_id)?.is_none() {
                    return Err(EngineError::UserNotFound(followed_id.to_string()));
                }
                repos.follows().follow(follower_id, followed_id)?;
                Ok(())
            })
    }

    pub fn unfollow(&self, follower_id: &str, followed_id: &str) -> EngineResult<()> {
        self.database
            .with_repositories(|repos| -> EngineResult<()> {
                repos.follows().unfollow(follower_id, followed_id)?;
                Ok(())
            })
    }

    pub fn block(&self, blocker_id: &str, blocked_id: &str) -> EngineResult<()> {
        self.database
            .with_repositories(|repos| -> EngineResult<()> {
                if repos.users().get(blocked_id)?.is_none() {
                    return Err(EngineError::UserNotFound(blocked_id.to_string()));
                }
                repos.blocks().block(blocker_id, blocked_id, &now_utc_iso())?;
                Ok(())
            })
    }

    pub fn unblock(&self, blocker_id: &str, blocked_id: &str) -> EngineResult<()> {
        self.database
            .with_repositories(|repos| -> EngineResult<()> {
                repos.blocks().unblock(blocker_id, blocked_id)?;
                Ok(())
            })
    }
}

/// Picks an unused "AnonymousNNNN" name. Collisions are resolved by
/// redrawing; after a bounded number of draws the numeric space is widened.
fn generate_anonymous_name(users: &impl UserRepository) -> anyhow::Result<String> {
    let mut rng = rand::rng();
    for _ in 0..16 {
        let candidate = format!("Anonymous{}", rng.random_range(0..10_000));
        if users.get_by_name(&candidate)?.is_none() {
            return Ok(candidate);
        }
    }
    Ok(format!("Anonymous{}", rng.random_range(10_000..100_000_000)))
}
