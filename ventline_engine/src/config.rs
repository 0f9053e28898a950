use anyhow::{anyhow, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct VentlineConfig {
    pub paths: VentlinePaths,
    pub community: CommunityConfig,
    pub limits: LimitsConfig,
}

impl VentlineConfig {
    pub fn from_env() -> Result<Self> {
        let paths = VentlinePaths::discover()?;
        Ok(Self {
            paths,
            community: CommunityConfig::from_env(),
            limits: LimitsConfig::from_env(),
        })
    }

}

#[derive(Debug, Clone, Default)]
pub struct CommunityConfig {
    /// User granted the admin flag on first interaction and addressed by
    /// moderation notifications. Optional: without it, posts queue until an
    /// existing admin acts on them.
    pub admin_user_id: Option<String>,
}

impl CommunityConfig {
    pub fn from_env() -> Self {
        let admin_user_id = env::var("VENTLINE_ADMIN_ID").ok().and_then(|raw| {
            let trimmed = raw.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        });
        Self { admin_user_id }
    }
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// How long an unconfirmed post draft stays valid.
    pub draft_ttl: Duration,
    /// Comments / messages per page.
    pub page_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            draft_ttl: Duration::from_secs(300),
            page_size: 5,
        }
    }
}

impl LimitsConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let draft_ttl = env::var("VENTLINE_DRAFT_TTL_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.draft_ttl);
        let page_size = env::var("VENTLINE_PAGE_SIZE")
            .ok()
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(defaults.page_size);
        Self {
            draft_ttl,
            page_size,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VentlinePaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl VentlinePaths {
    pub fn discover() -> Result<Self> {
        if let Ok(base) = env::var("VENTLINE_DATA_DIR") {
            return Self::from_base_dir(base);
        }
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("ventline.db");
        let logs_dir = base.join("logs");
        Ok(Self {
            base,
            data_dir,
            db_path,
            logs_dir,
        })
    }
}
