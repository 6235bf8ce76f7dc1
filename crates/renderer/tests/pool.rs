//! Per-frame resource pool allocation and parameter writes.

mod common;

use inflight_renderer::{FrameResources, FrameSlot, PerFrameResourcePool, RenderError};

use common::{MockAccelerator, PARAMS_CAPACITY, Timeline};

#[test]
fn test_allocates_one_set_per_slot() {
    let mut accelerator = MockAccelerator::new(Timeline::new(1));
    let pool = PerFrameResourcePool::new(&mut accelerator, 4).expect("Failed to create pool");

    assert_eq!(pool.len(), 4);
    assert!(!pool.is_empty());
    let slots: Vec<usize> = pool.iter().map(|f| f.slot().index()).collect();
    assert_eq!(slots, vec![0, 1, 2, 3]);
}

#[test]
fn test_zero_slots_rejected() {
    let mut accelerator = MockAccelerator::new(Timeline::new(1));
    assert!(matches!(
        PerFrameResourcePool::new(&mut accelerator, 0),
        Err(RenderError::Config(_))
    ));
}

#[test]
fn test_resources_are_reused_not_reallocated() {
    let mut accelerator = MockAccelerator::new(Timeline::new(1));
    let mut pool = PerFrameResourcePool::new(&mut accelerator, 2).expect("Failed to create pool");

    let first = pool.iter().next().map(|f| f.params_buffer());
    let mut slot = first_slot(&pool);
    for round in 0..6u32 {
        pool.write_params(slot, &round.to_ne_bytes())
            .expect("write_params failed");
        slot = slot.next();
    }

    assert_eq!(pool.iter().next().map(|f| f.params_buffer()), first);
    assert_eq!(pool.resources_for(slot).params, 4u32.to_ne_bytes());
    assert_eq!(pool.resources_for(slot.next()).params, 5u32.to_ne_bytes());
}

#[test]
fn test_params_overflow() {
    let mut accelerator = MockAccelerator::new(Timeline::new(1));
    let mut pool = PerFrameResourcePool::new(&mut accelerator, 2).expect("Failed to create pool");
    let slot = first_slot(&pool);

    let exact = [7u8; PARAMS_CAPACITY];
    pool.write_params(slot, &exact).expect("write_params failed");

    match pool.write_params(slot, &[0u8; PARAMS_CAPACITY + 1]) {
        Err(RenderError::ParamsOverflow { len, capacity }) => {
            assert_eq!(len, PARAMS_CAPACITY + 1);
            assert_eq!(capacity, PARAMS_CAPACITY);
        }
        other => panic!("expected overflow, got {other:?}"),
    }
    // A rejected write leaves the previous contents alone.
    assert_eq!(pool.resources_for(slot).params, exact);
}

fn first_slot<F: FrameResources>(pool: &PerFrameResourcePool<F>) -> FrameSlot {
    pool.iter().next().map(|f| f.slot()).expect("empty pool")
}
