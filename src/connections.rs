use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::PlatformType;
use crate::storage::repository;
use crate::storage::Database;

/// Which platforms a brand has an active connection to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedPlatforms {
    pub meta: bool,
    pub shopify: bool,
    pub tiktok: bool,
    pub google: bool,
}

impl ConnectedPlatforms {
    pub fn from_active(active: &[PlatformType]) -> Self {
        let mut connected = Self::default();
        for platform in active {
            match platform {
                PlatformType::Meta => connected.meta = true,
                PlatformType::Shopify => connected.shopify = true,
                PlatformType::Tiktok => connected.tiktok = true,
                PlatformType::Google => connected.google = true,
            }
        }
        connected
    }

    pub fn is_connected(&self, platform: PlatformType) -> bool {
        match platform {
            PlatformType::Meta => self.meta,
            PlatformType::Shopify => self.shopify,
            PlatformType::Tiktok => self.tiktok,
            PlatformType::Google => self.google,
        }
    }

    pub fn any(&self) -> bool {
        self.meta || self.shopify || self.tiktok || self.google
    }

    pub fn names(&self) -> Vec<&'static str> {
        PlatformType::ALL
            .iter()
            .filter(|p| self.is_connected(**p))
            .map(|p| p.as_str())
            .collect()
    }
}

/// Look up the active platform connections for a brand.
pub async fn resolve_connections(db: &Database, brand_id: &str) -> Result<ConnectedPlatforms> {
    let brand_id = brand_id.to_string();
    let active = db
        .reader()
        .call(move |conn| repository::active_platforms(conn, &brand_id))
        .await?;
    Ok(ConnectedPlatforms::from_active(&active))
}
