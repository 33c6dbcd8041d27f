use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crate::{
    cache::ObjectCache,
    config::{ConfigError, RenderConfig},
    garbage::TimelineValues,
    id_gen::IdGenerator,
    subresource::{subresource_index, SubresourceRange},
    types::{AccessState, AspectMask, Extent3D, Format},
};

#[test]
fn access_state_helpers() {
    assert!(AccessState::UNKNOWN.is_unknown());
    assert!(!AccessState::COMMON.is_unknown());

    assert!(AccessState::SHADER_WRITE.has_unordered_access());
    assert!((AccessState::SHADER_WRITE | AccessState::SHADER_READ).has_unordered_access());
    assert!(!AccessState::SHADER_READ.has_unordered_access());

    assert!((AccessState::VERTEX_BUFFER | AccessState::SHADER_READ).is_read_only());
    assert!(!AccessState::TRANSFER_WRITE.is_read_only());
    assert!(!(AccessState::SHADER_READ | AccessState::COLOR_ATTACHMENT_WRITE).is_read_only());
}

#[test]
fn subresource_resolve_clamps() {
    let resolved = SubresourceRange::ALL.resolve(4, 2);
    assert_eq!(resolved, SubresourceRange::mips(0, 4).resolve(4, 2));
    assert_eq!(resolved.mip_count, 4);
    assert_eq!(resolved.layer_count, 2);

    let resolved = SubresourceRange {
        base_mip: 3,
        mip_count: 10,
        base_layer: 1,
        layer_count: 1,
    }
    .resolve(4, 2);
    assert_eq!(resolved, SubresourceRange::single(3, 1));

    // Starting past the end gives an empty range.
    assert!(SubresourceRange::single(7, 0).resolve(4, 1).is_empty());
}

#[test]
fn subresource_is_entire() {
    assert!(SubresourceRange::ALL.is_entire(4, 6));
    assert!(SubresourceRange::mips(0, 1).is_entire(1, 1));
    assert!(SubresourceRange::single(0, 0).is_entire(1, 1));
    assert!(!SubresourceRange::single(0, 0).is_entire(2, 1));
    assert!(!SubresourceRange::mips(1, 3).is_entire(4, 1));
}

#[test]
fn subresource_iteration_order() {
    let range = SubresourceRange {
        base_mip: 1,
        mip_count: 2,
        base_layer: 0,
        layer_count: 2,
    };

    let visited: Vec<_> = range.iter().collect();
    assert_eq!(visited, vec![(1, 0), (2, 0), (1, 1), (2, 1)]);

    let indices: Vec<_> = visited
        .iter()
        .map(|(mip, layer)| subresource_index(*mip, *layer, 4))
        .collect();
    assert_eq!(indices, vec![1, 2, 5, 6]);
}

#[test]
fn id_recycling() {
    let ids = IdGenerator::default();
    let a = ids.create();
    let b = ids.create();
    assert_ne!(a, b);
    assert_eq!(a.get(), 1);
    assert_eq!(b.get(), 2);
    assert_eq!(ids.live(), 2);

    ids.free(a);
    assert_eq!(ids.live(), 1);
    assert_eq!(ids.create(), a);
    assert_eq!(ids.create().get(), 3);
    assert_eq!(b.to_string(), "#2");
}

#[derive(Hash)]
struct Desc {
    name: &'static str,
    size: u32,
}

#[test]
fn cache_returns_same_value() {
    let cache = ObjectCache::<Desc, Arc<u32>>::new();

    let a = cache
        .get_or_create(&Desc { name: "a", size: 4 }, |desc| {
            Ok::<_, ()>(Arc::new(desc.size))
        })
        .unwrap();
    let b = cache
        .get_or_create(&Desc { name: "a", size: 4 }, |_| -> Result<_, ()> {
            panic!("should have been cached")
        })
        .unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let c = cache
        .get_or_create(&Desc { name: "b", size: 4 }, |desc| {
            Ok::<_, ()>(Arc::new(desc.size))
        })
        .unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.constructed(), 2);
}

#[test]
fn cache_failed_construction_is_not_cached() {
    let cache = ObjectCache::<Desc, Arc<u32>>::new();
    let desc = Desc { name: "a", size: 1 };

    assert_eq!(cache.get_or_create(&desc, |_| Err("nope")), Err("nope"));
    assert!(cache.is_empty());
    assert!(cache.get(&desc).is_none());

    let value = cache
        .get_or_create(&desc, |desc| Ok::<_, &str>(Arc::new(desc.size)))
        .unwrap();
    assert_eq!(*value, 1);
    assert_eq!(cache.constructed(), 1);
}

#[test]
fn cache_invalidate_all() {
    let cache = ObjectCache::<Desc, Arc<u32>>::new();
    for size in 0..5 {
        cache
            .get_or_create(&Desc { name: "x", size }, |desc| {
                Ok::<_, ()>(Arc::new(desc.size))
            })
            .unwrap();
    }

    assert_eq!(cache.invalidate_all(), 5);
    assert!(cache.is_empty());

    cache
        .get_or_create(&Desc { name: "x", size: 0 }, |desc| {
            Ok::<_, ()>(Arc::new(desc.size))
        })
        .unwrap();
    assert_eq!(cache.constructed(), 6);
}

#[test]
fn cache_constructs_once_across_threads() {
    const THREADS: usize = 8;

    let cache = ObjectCache::<Desc, Arc<u32>>::new();
    let calls = AtomicUsize::new(0);

    let results: Vec<Arc<u32>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    cache
                        .get_or_create(&Desc { name: "shared", size: 42 }, |desc| {
                            calls.fetch_add(1, Ordering::Relaxed);
                            Ok::<_, ()>(Arc::new(desc.size))
                        })
                        .unwrap()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(calls.load(Ordering::Relaxed), 1);
    assert_eq!(cache.constructed(), 1);
    for result in &results {
        assert!(Arc::ptr_eq(result, &results[0]));
    }
}

#[test]
fn timeline_values_reached() {
    let target = TimelineValues([3, 0, 5]);
    assert!(!target.reached_by(&TimelineValues([3, 0, 4])));
    assert!(target.reached_by(&TimelineValues([3, 0, 5])));
    assert!(target.reached_by(&TimelineValues([9, 1, 6])));
    assert!(TimelineValues::default().reached_by(&TimelineValues::default()));
}

#[test]
fn format_aspects() {
    assert_eq!(Format::Rgba8Unorm.aspect_mask(), AspectMask::COLOR);
    assert_eq!(Format::D32Sfloat.aspect_mask(), AspectMask::DEPTH);
    assert_eq!(
        Format::D24UnormS8Uint.aspect_mask(),
        AspectMask::DEPTH | AspectMask::STENCIL
    );
}

#[test]
fn extent_mips() {
    let extent = Extent3D::new(256, 64, 1);
    assert_eq!(extent.mip(2), Extent3D::new(64, 16, 1));
    assert_eq!(extent.mip(8), Extent3D::new(1, 1, 1));
}

#[test]
fn config_defaults_and_overrides() {
    let config = RenderConfig::from_ron_str("()").unwrap();
    assert_eq!(config, RenderConfig::default());
    assert!(config.wait_timeout().is_none());

    let config = RenderConfig::from_ron_str(
        "(frames_in_flight: 3, command_buffer_wait_timeout_ms: Some(250))",
    )
    .unwrap();
    assert_eq!(config.frames_in_flight, 3);
    assert_eq!(config.descriptor_table_capacity, 64);
    assert!(config.uav_barriers_enabled_by_default);
    assert_eq!(
        config.wait_timeout(),
        Some(std::time::Duration::from_millis(250))
    );
}

#[test]
fn config_rejects_bad_values() {
    assert!(matches!(
        RenderConfig::from_ron_str("(frames_in_flight: 0)"),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        RenderConfig::from_ron_str("(frames_in_flight: \"two\")"),
        Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
        RenderConfig::load("does/not/exist.ron"),
        Err(ConfigError::Io(_))
    ));
}
