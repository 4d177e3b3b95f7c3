use matching_service::config::MatchingConfig;
use matching_service::{
    MatchError, MatchQuery, MatchingService, MemoryPostingStore, PostingStore, RedisPostingStore,
};
use std::sync::Arc;
use std::time::Duration;

fn memory_service() -> (MatchingService<MemoryPostingStore>, Arc<MemoryPostingStore>) {
    let store = Arc::new(MemoryPostingStore::new());
    (
        MatchingService::new(store.clone(), MatchingConfig::default()),
        store,
    )
}

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-9
}

/// Member 131523112 holds the attributes member 5 wants, but has no
/// interest in anything 5 holds, so the pair is not reciprocal.
async fn one_sided_scenario<S: PostingStore>(service: &MatchingService<S>) {
    service
        .add_attributes(
            "131523112",
            &["orientation:straight", "gender:f", "ethnicity:white"],
        )
        .await
        .unwrap();
    service
        .record_interest("5", 1.0, &["orientation:straight", "gender:f"])
        .await
        .unwrap();
    service
        .record_interest("5", 1.0, &["orientation:straight"])
        .await
        .unwrap();

    let normalized = service.interests().normalized_interest("5").await.unwrap();
    assert_eq!(normalized.len(), 2);
    assert!(close(normalized["orientation:straight"], 2.0 / 3.0));
    assert!(close(normalized["gender:f"], 1.0 / 3.0));

    let query = MatchQuery::new(10)
        .with_or_filters(["orientation:straight"])
        .with_my_interests(normalized);

    let matches = service.recommend(&query).await.unwrap();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn test_one_sided_interest_scenario() {
    let (service, _) = memory_service();
    one_sided_scenario(&service).await;
}

#[tokio::test]
async fn test_scenario_becomes_reciprocal() {
    let (service, _) = memory_service();
    one_sided_scenario(&service).await;

    service.add_attributes("5", &["gender:m"]).await.unwrap();
    service
        .record_interest("131523112", 1.0, &["gender:m"])
        .await
        .unwrap();

    let matches = service
        .recommend_for("5", 10, &["orientation:straight".to_string()], &[])
        .await
        .unwrap();

    // given = 2/3 + 1/3 = 1, received = 1
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].member_id, "131523112");
    assert!(close(matches[0].score, 1.0));
}

#[tokio::test]
async fn test_presence_invariant_through_service() {
    let (service, _) = memory_service();
    service.add_attributes("a", &["x", "y"]).await.unwrap();
    service.add_attributes("b", &["y", "z"]).await.unwrap();

    for member in ["a", "b"] {
        for attribute in service.attributes().member_attributes(member).await.unwrap() {
            let holders = service.attributes().members_with(&attribute).await.unwrap();
            assert!(holders.contains(&member.to_string()));
        }
    }
    assert_eq!(
        service.attributes().members_with("y").await.unwrap(),
        vec!["a", "b"]
    );
}

#[tokio::test]
async fn test_flat_args_query() {
    let (service, _) = memory_service();
    service.add_attributes("a", &["pool", "x"]).await.unwrap();
    service.record_interest("a", 1.0, &["me"]).await.unwrap();

    let query =
        MatchQuery::from_args(&["5", "1", "pool", "0", "1", "me", "1", "x", "0.5"]).unwrap();
    let matches = service.recommend(&query).await.unwrap();

    // harmonic mean of 0.5 and 1.0
    assert_eq!(matches.len(), 1);
    assert!(close(matches[0].score, 2.0 / 3.0));

    let err = MatchQuery::from_args(&["5", "3", "pool"]).unwrap_err();
    assert_eq!(err.code(), "invalid_query");
    assert!(matches!(err, MatchError::InvalidQuery(_)));
}

#[tokio::test]
async fn test_concurrent_recommends_leave_no_scratch() {
    let (service, store) = memory_service();
    for i in 0..20 {
        let member = format!("m{}", i);
        service.add_attributes(&member, &["pool", "x"]).await.unwrap();
        service
            .record_interest(&member, (i + 1) as f64, &["me"])
            .await
            .unwrap();
    }
    let before = store.keys().await;

    let service = Arc::new(service);
    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let query = MatchQuery::new(5)
                .with_or_filters(["pool"])
                .with_my_attributes(["me"])
                .with_my_interests([("x", 1.0)]);
            service.recommend(&query).await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    // every member's whole normalized profile is "me", so all tie at 1.0
    for matches in &results {
        assert_eq!(matches, &results[0]);
        assert_eq!(matches.len(), 5);
        assert!(matches.iter().all(|m| close(m.score, 1.0)));
    }
    assert_eq!(store.keys().await, before);
}

async fn redis_store(url: &str) -> Option<RedisPostingStore> {
    let client = redis::Client::open(url).ok()?;
    let probe = tokio::time::timeout(
        Duration::from_secs(1),
        client.get_multiplexed_async_connection(),
    )
    .await;
    if !matches!(probe, Ok(Ok(_))) {
        return None;
    }
    RedisPostingStore::connect(url).await.ok()
}

#[tokio::test]
async fn test_redis_store_scenario() {
    let url = std::env::var("MATCHING_REDIS_URL")
        .unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let Some(store) = redis_store(&url).await else {
        println!("Redis not reachable at {}, skipping", url);
        return;
    };

    let namespace = format!("it-{}", uuid::Uuid::new_v4().simple());
    let store = Arc::new(store);
    let service = MatchingService::new(
        store.clone(),
        MatchingConfig {
            key_namespace: namespace.clone(),
            ..MatchingConfig::default()
        },
    );

    one_sided_scenario(&service).await;

    service.add_attributes("5", &["gender:m"]).await.unwrap();
    service
        .record_interest("131523112", 1.0, &["gender:m"])
        .await
        .unwrap();
    let matches = service
        .recommend_for("5", 10, &["orientation:straight".to_string()], &[])
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert!(close(matches[0].score, 1.0));

    let mut conn = client_conn(&url).await;
    let leftover: Vec<String> = redis::cmd("KEYS")
        .arg(format!("v1:{}:scratch:*", namespace))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert!(leftover.is_empty());

    let all: Vec<String> = redis::cmd("KEYS")
        .arg(format!("v1:{}:*", namespace))
        .query_async(&mut conn)
        .await
        .unwrap();
    store.delete(&all).await.unwrap();
}

async fn client_conn(url: &str) -> redis::aio::MultiplexedConnection {
    redis::Client::open(url)
        .unwrap()
        .get_multiplexed_async_connection()
        .await
        .unwrap()
}
