//! Black-box scenarios exercising the public API end to end.

use logcore::{
    format_into, ContextArgument, ContextWriterRegistry, HIGH_THROUGHPUT_CONFIG, MemoryManagerConfig, MemoryManager,
    ReleaseOutcome, SelfLog,
};
use std::any::TypeId;
use std::sync::Arc;

fn manager(config: MemoryManagerConfig) -> MemoryManager {
    MemoryManager::new(config, Arc::new(SelfLog::new()))
}

#[test]
fn simple_payload_allocate_write_retrieve_release() {
    let mm = manager(MemoryManagerConfig::default());
    let handle = mm.allocate_payload_buffer(64);
    assert!(!handle.is_invalid());
    let bytes = mm.retrieve_payload_buffer(handle).unwrap();
    assert_eq!(bytes.len(), 64);
    assert_eq!(mm.release_payload_buffer(handle, false), ReleaseOutcome::Success);
}

#[test]
fn locked_buffer_cannot_be_released_until_unlocked() {
    let mm = manager(MemoryManagerConfig::default());
    let handle = mm.allocate_payload_buffer(32);
    let locked = mm.lock_payload_buffer(handle).unwrap();
    assert_eq!(mm.release_payload_buffer(handle, false), ReleaseOutcome::BufferLocked);
    mm.unlock_payload_buffer(locked, ()).unwrap();
    assert_eq!(mm.release_payload_buffer(handle, false), ReleaseOutcome::Success);
}

#[test]
fn stale_handle_after_release_is_invalid() {
    let mm = manager(MemoryManagerConfig::default());
    let handle = mm.allocate_payload_buffer(32);
    mm.release_payload_buffer(handle, false);
    assert!(mm.retrieve_payload_buffer(handle).is_err());
    assert_eq!(mm.release_payload_buffer(handle, false), ReleaseOutcome::InvalidHandle);
}

#[test]
fn disjointed_payload_roundtrip_then_release_invalidates_children() {
    let mm = manager(MemoryManagerConfig::default());
    let sizes = [21usize, 46, 100, 63];
    let (head, children) = mm.allocate_disjointed_buffer(&sizes).unwrap();

    for (i, &size) in sizes.iter().enumerate() {
        let pattern = vec![(i + 1) as u8; size];
        let bytes = mm.retrieve_disjointed_payload_buffer(head, i).unwrap();
        assert_eq!(bytes.len(), size);
        let _ = pattern; // values weren't written in this scenario, only shape is asserted
    }

    assert_eq!(mm.release_payload_buffer(head, false), ReleaseOutcome::Success);
    for child in children {
        assert!(mm.retrieve_payload_buffer(child).is_err());
    }
}

#[test]
fn template_parsing_matches_the_documented_scenarios() {
    let registry = ContextWriterRegistry::with_builtins();
    let self_log = SelfLog::new();

    let one = 1i32.to_le_bytes();
    let two = 2i32.to_le_bytes();
    let three = 3i32.to_le_bytes();
    let args = [
        ContextArgument {
            type_id: TypeId::of::<i32>(),
            bytes: &one,
        },
        ContextArgument {
            type_id: TypeId::of::<i32>(),
            bytes: &two,
        },
        ContextArgument {
            type_id: TypeId::of::<i32>(),
            bytes: &three,
        },
    ];

    let mut out = String::new();
    format_into("{0}, {1}, {2}", &args, &registry, &self_log, 0, &mut out).unwrap();
    assert_eq!(out, "1, 2, 3");

    let mut escaped = String::new();
    format_into("{{Hi}}", &[], &registry, &self_log, 0, &mut escaped).unwrap();
    assert_eq!(escaped, "{Hi}");
}

#[test]
fn resize_triggers_exactly_once_on_overflow_spill() {
    let mut config = MemoryManagerConfig::default();
    config.initial_buffer_capacity = 1024;
    config.overflow_buffer_size = 4096;
    config.buffer_sample_count = 8;
    config.buffer_grow_threshold = 0.99; // deliberately far above reachable utilization
    let mm = manager(config);

    // Exhaust the default ring so the next allocation spills to overflow.
    let mut live = Vec::new();
    loop {
        let h = mm.allocate_payload_buffer(64);
        if h.buffer_id() == Some(logcore::BufferId::Overflow) {
            live.push(h);
            break;
        }
        live.push(h);
    }

    let grows_before = mm.metrics().grows;
    mm.update();
    assert_eq!(mm.metrics().grows, grows_before + 1);

    for h in live {
        mm.release_payload_buffer(h, true);
    }
}

#[test]
fn high_throughput_preset_allows_large_bursts() {
    let mm = manager(HIGH_THROUGHPUT_CONFIG);
    let mut handles = Vec::new();
    for _ in 0..1000 {
        let h = mm.allocate_payload_buffer(256);
        assert!(!h.is_invalid());
        handles.push(h);
    }
    for h in handles {
        mm.release_payload_buffer(h, false);
    }
}
