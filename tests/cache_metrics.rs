mod support;

use std::collections::HashSet;
use std::sync::Arc;

use atrium::application::menu::MenuResolutionService;
use atrium::application::repos::MenuLimits;
use atrium::cache::{CacheConfig, MENU_NAMESPACE, TieredCache};
use metrics_util::debugging::DebuggingRecorder;
use support::{InMemoryMenus, MemoryShared, UnreachableShared, blog_navigation};

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let repo = InMemoryMenus::with_entries(blog_navigation());
    let shared = Arc::new(MemoryShared::default());

    // miss, then L1 hit on the first instance
    let first = MenuResolutionService::new(
        repo.clone(),
        Arc::new(TieredCache::new(CacheConfig::default(), shared.clone())),
        MenuLimits::default(),
    );
    first.resolve(None).await.expect("cold");
    first.resolve(None).await.expect("l1");

    // L2 hit on a second instance sharing the store
    let second = MenuResolutionService::new(
        repo.clone(),
        Arc::new(TieredCache::new(CacheConfig::default(), shared)),
        MenuLimits::default(),
    );
    second.resolve(None).await.expect("l2");

    // shared-tier errors and invalidation
    let degraded = Arc::new(TieredCache::new(
        CacheConfig::default(),
        Arc::new(UnreachableShared),
    ));
    let third = MenuResolutionService::new(repo, degraded.clone(), MenuLimits::default());
    third.resolve(Some("admin")).await.expect("degraded");
    degraded.invalidate(MENU_NAMESPACE).await;

    let snapshot = snapshotter.snapshot().into_vec();
    let names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "atrium_menu_cache_hit_total",
        "atrium_menu_cache_miss_total",
        "atrium_menu_cache_l2_error_total",
        "atrium_menu_cache_invalidate_total",
        "atrium_menu_resolve_ms",
    ];
    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }

    let hit_tiers: HashSet<String> = snapshot
        .iter()
        .filter(|(composite_key, _, _, _)| {
            composite_key.key().name() == "atrium_menu_cache_hit_total"
        })
        .flat_map(|(composite_key, _, _, _)| {
            composite_key
                .key()
                .labels()
                .map(|label| label.value().to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(
        hit_tiers,
        HashSet::from(["l1".to_string(), "l2".to_string()])
    );
}
