#[cfg(test)]
mod test {

    use std::sync::Arc;

    use chrono::Duration;

    use crate::cache::token::{CachedToken, TokenOrigin};
    use crate::error::TokenCacheError;
    use crate::helpers::time::{Clock, ManualClock};
    use crate::store::{MemoryTokenStore, StoreError, TokenStore};
    use crate::tests::common::{cache_with, StubBehavior, StubIssuer, UnreachableStore, API};

    const NOW: i64 = 1_700_000_000;

    #[tokio::test]
    async fn valid_stored_token_is_served_without_minting() {
        let clock = ManualClock::at_unix(NOW);
        let store = MemoryTokenStore::new();
        store.upsert(&CachedToken::new(API, "abc", clock.now() + Duration::seconds(1000))).await.unwrap();
        let issuer = StubIssuer::issuing(Some(3600));
        let cache = cache_with(Arc::new(store.clone()), issuer.clone(), &clock);

        let token = cache.get_access_token(API).await.unwrap();

        assert_eq!(token.value, "abc");
        assert_eq!(token.origin, TokenOrigin::Cached);
        assert_eq!(issuer.mints(), 0);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn token_expiring_exactly_now_is_refreshed() {
        let clock = ManualClock::at_unix(NOW);
        let store = MemoryTokenStore::new();
        store.upsert(&CachedToken::new(API, "stale", clock.now())).await.unwrap();
        let issuer = StubIssuer::issuing(Some(3600));
        let cache = cache_with(Arc::new(store.clone()), issuer.clone(), &clock);

        let token = cache.get_access_token(API).await.unwrap();

        assert_eq!(token.value, "token-1");
        assert_eq!(token.origin, TokenOrigin::Minted);
        assert_eq!(issuer.mints(), 1);
        assert_eq!(store.find(API).await.unwrap().unwrap().token, "token-1");
    }

    #[tokio::test]
    async fn past_token_is_refreshed() {
        let clock = ManualClock::at_unix(NOW);
        let store = MemoryTokenStore::new();
        store.upsert(&CachedToken::new(API, "stale", clock.now() - Duration::seconds(1))).await.unwrap();
        let issuer = StubIssuer::issuing(Some(3600));
        let cache = cache_with(Arc::new(store), issuer.clone(), &clock);

        assert_eq!(cache.get_access_token(API).await.unwrap().value, "token-1");
        assert_eq!(issuer.mints(), 1);
    }

    #[tokio::test]
    async fn reported_ttl_is_shortened_by_safety_margin() {
        let clock = ManualClock::at_unix(NOW);
        let store = MemoryTokenStore::new();
        let cache = cache_with(Arc::new(store.clone()), StubIssuer::issuing(Some(5_184_000)), &clock);

        let token = cache.get_access_token(API).await.unwrap();

        let stored = store.find(API).await.unwrap().unwrap();
        assert_eq!(stored.expires_at.timestamp(), NOW + 5_184_000 - 300);
        assert_eq!(token.expires_at, stored.expires_at);
    }

    #[tokio::test]
    async fn missing_ttl_falls_back_to_sixty_days() {
        let clock = ManualClock::at_unix(NOW);
        let store = MemoryTokenStore::new();
        let cache = cache_with(Arc::new(store.clone()), StubIssuer::issuing(None), &clock);

        cache.get_access_token(API).await.unwrap();

        let stored = store.find(API).await.unwrap().unwrap();
        assert_eq!(stored.expires_at.timestamp(), NOW + 5_184_000 - 300);
    }

    #[tokio::test]
    async fn second_call_after_refresh_reads_the_store() {
        let clock = ManualClock::at_unix(NOW);
        let store = MemoryTokenStore::new();
        let issuer = StubIssuer::issuing(Some(3600));
        let cache = cache_with(Arc::new(store.clone()), issuer.clone(), &clock);

        let first = cache.get_access_token(API).await.unwrap();
        let second = cache.get_access_token(API).await.unwrap();

        assert_eq!(first.value, second.value);
        assert_eq!(second.origin, TokenOrigin::Cached);
        assert_eq!(issuer.mints(), 1);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn stored_token_is_replaced_once_the_clock_passes_expiry() {
        let clock = ManualClock::at_unix(NOW);
        let store = MemoryTokenStore::new();
        let issuer = StubIssuer::issuing(Some(600));
        let cache = cache_with(Arc::new(store.clone()), issuer.clone(), &clock);

        assert_eq!(cache.get_access_token(API).await.unwrap().value, "token-1");
        clock.advance(Duration::seconds(299));
        assert_eq!(cache.get_access_token(API).await.unwrap().value, "token-1");
        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get_access_token(API).await.unwrap().value, "token-2");

        assert_eq!(issuer.mints(), 2);
        assert_eq!(store.find(API).await.unwrap().unwrap().token, "token-2");
    }

    #[tokio::test]
    async fn lifetime_within_margin_is_returned_but_not_stored() {
        let clock = ManualClock::at_unix(NOW);
        let store = MemoryTokenStore::new();
        let cache = cache_with(Arc::new(store.clone()), StubIssuer::issuing(Some(300)), &clock);

        let token = cache.get_access_token(API).await.unwrap();

        assert_eq!(token.value, "token-1");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn upstream_refusal_yields_none_and_writes_nothing() {
        let clock = ManualClock::at_unix(NOW);
        let store = MemoryTokenStore::new();
        let issuer = Arc::new(StubIssuer::new(StubBehavior::Status(503)));
        let cache = cache_with(Arc::new(store.clone()), issuer.clone(), &clock);

        assert!(cache.try_get_access_token(API).await.unwrap().is_none());
        let err = cache.get_access_token(API).await.unwrap_err();
        assert!(err.is_unavailable(), "{err}");

        assert_eq!(issuer.mints(), 2);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn malformed_upstream_response_is_an_error_not_none() {
        let clock = ManualClock::at_unix(NOW);
        let cache = cache_with(
            Arc::new(MemoryTokenStore::new()),
            Arc::new(StubIssuer::new(StubBehavior::Malformed)),
            &clock,
        );

        let err = cache.try_get_access_token(API).await.unwrap_err();
        assert!(matches!(err, TokenCacheError::Malformed { .. }), "{err}");
    }

    #[tokio::test]
    async fn store_failure_is_surfaced() {
        let clock = ManualClock::at_unix(NOW);
        let issuer = StubIssuer::issuing(Some(3600));
        let cache = cache_with(Arc::new(UnreachableStore), issuer.clone(), &clock);

        let err = cache.try_get_access_token(API).await.unwrap_err();
        assert!(matches!(err, TokenCacheError::Store(StoreError::Unavailable(_))), "{err}");
        assert_eq!(issuer.mints(), 0);
    }

    #[tokio::test]
    async fn empty_and_unknown_names_are_rejected_before_io() {
        let clock = ManualClock::at_unix(NOW);
        let issuer = StubIssuer::issuing(Some(3600));
        let cache = cache_with(Arc::new(UnreachableStore), issuer.clone(), &clock);

        assert!(matches!(cache.get_access_token("").await, Err(TokenCacheError::EmptyApiName)));
        assert!(matches!(cache.get_access_token("   ").await, Err(TokenCacheError::EmptyApiName)));
        assert!(matches!(cache.get_access_token("TMDB").await, Err(TokenCacheError::UnknownApi(name)) if name == "TMDB"));
        assert_eq!(issuer.mints(), 0);
    }
}
