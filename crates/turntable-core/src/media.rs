//! Media resolution capability boundary (§1 non-goal: "no specific media
//! backend"). Grounded on the same narrow-trait shape as [`crate::auth`]:
//! the queue state machine needs to resolve a `MediaId` to playable
//! metadata and a stream URL, but never needs to know where that data
//! actually lives.

use async_trait::async_trait;

use turntable_protocol::{MediaId, MediaInfo};

use crate::error::DomainError;

#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, media_id: &MediaId) -> Result<MediaInfo, DomainError>;

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<MediaInfo>, DomainError>;

    async fn stream_url(&self, media_id: &MediaId) -> Result<String, DomainError>;
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    #[derive(Default)]
    pub struct InMemoryMediaResolver {
        catalog: RwLock<HashMap<MediaId, MediaInfo>>,
    }

    impl InMemoryMediaResolver {
        pub async fn seed(&self, info: MediaInfo) {
            self.catalog.write().await.insert(info.media_id.clone(), info);
        }
    }

    #[async_trait]
    impl MediaResolver for InMemoryMediaResolver {
        async fn resolve(&self, media_id: &MediaId) -> Result<MediaInfo, DomainError> {
            self.catalog
                .read()
                .await
                .get(media_id)
                .cloned()
                .ok_or(DomainError::MediaNotFound)
        }

        async fn search(&self, query: &str, limit: u32) -> Result<Vec<MediaInfo>, DomainError> {
            let needle = query.to_lowercase();
            let matches = self
                .catalog
                .read()
                .await
                .values()
                .filter(|info| info.title.to_lowercase().contains(&needle))
                .take(limit as usize)
                .cloned()
                .collect();
            Ok(matches)
        }

        async fn stream_url(&self, media_id: &MediaId) -> Result<String, DomainError> {
            self.resolve(media_id)
                .await
                .map(|info| format!("https://media.example/{}", info.media_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::InMemoryMediaResolver;
    use super::*;

    fn sample(id: &str, title: &str) -> MediaInfo {
        MediaInfo {
            media_id: MediaId::from(id),
            title: title.to_owned(),
            artist: "Someone".to_owned(),
            duration_secs: 180,
        }
    }

    #[tokio::test]
    async fn resolving_an_unseeded_id_fails_with_media_not_found() {
        let resolver = InMemoryMediaResolver::default();
        let result = resolver.resolve(&MediaId::from("missing")).await;
        assert!(matches!(result, Err(DomainError::MediaNotFound)));
    }

    #[tokio::test]
    async fn search_matches_case_insensitively_and_respects_limit() {
        let resolver = InMemoryMediaResolver::default();
        resolver.seed(sample("1", "Chill Waves")).await;
        resolver.seed(sample("2", "chill lofi")).await;
        resolver.seed(sample("3", "Upbeat Anthem")).await;

        let results = resolver.search("CHILL", 1).await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
