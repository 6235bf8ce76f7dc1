//! Surface state machine and generation checks.

mod common;

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use ash::vk;

use inflight_renderer::{RenderError, SurfaceState, SwapchainManager};

use common::MockSurface;

fn extent(width: u32, height: u32) -> vk::Extent2D {
    vk::Extent2D { width, height }
}

fn manager(display: &Rc<Cell<(u32, u32)>>, frames: usize) -> SwapchainManager<MockSurface> {
    let (width, height) = display.get();
    SwapchainManager::new(
        MockSurface::new(display.clone(), 3),
        extent(width, height),
        true,
        frames,
        Duration::from_millis(100),
    )
    .expect("Failed to create swapchain manager")
}

#[test]
fn test_initial_build() {
    let display = Rc::new(Cell::new((1280, 720)));
    let manager = manager(&display, 2);

    assert_eq!(manager.state(), SurfaceState::Valid);
    assert_eq!(manager.generation(), 1);
    assert_eq!(manager.extent(), extent(1280, 720));
    assert_eq!(manager.image_count(), 3);
    assert_eq!(manager.recreations(), 0);
}

#[test]
fn test_starts_stale_when_minimized() {
    let display = Rc::new(Cell::new((0, 0)));
    let mut manager = manager(&display, 2);

    assert_eq!(manager.state(), SurfaceState::Stale);
    assert_eq!(manager.generation(), 0);
    assert!(manager.surface().builds.is_empty());
    assert!(manager.acquire_next().expect("acquire failed").is_none());
}

#[test]
fn test_recreate_at_zero_extent_is_noop() {
    let display = Rc::new(Cell::new((800, 600)));
    let mut manager = manager(&display, 2);
    manager.invalidate();

    display.set((0, 0));
    let result = manager.recreate(extent(0, 0), true).expect("recreate failed");
    assert_eq!(result, None);
    assert_eq!(manager.state(), SurfaceState::Stale);
    assert_eq!(manager.generation(), 1);
    assert_eq!(manager.surface().builds.len(), 1);
}

#[test]
fn test_recreate_bumps_generation() {
    let display = Rc::new(Cell::new((800, 600)));
    let mut manager = manager(&display, 2);
    let before = manager
        .acquire_next()
        .expect("acquire failed")
        .expect("no image");
    assert!(manager.is_current(&before));

    display.set((1024, 768));
    let negotiated = manager
        .recreate(extent(1024, 768), true)
        .expect("recreate failed");
    assert_eq!(negotiated, Some(extent(1024, 768)));
    assert_eq!(manager.state(), SurfaceState::Valid);
    assert_eq!(manager.generation(), 2);
    assert_eq!(manager.recreations(), 1);
    assert!(!manager.is_current(&before));

    let after = manager
        .acquire_next()
        .expect("acquire failed")
        .expect("no image");
    assert_eq!(after.generation(), 2);
    assert!(manager.images().all(|image| image != before.image));
}

#[test]
fn test_present_rejects_stale_image() {
    let display = Rc::new(Cell::new((800, 600)));
    let mut manager = manager(&display, 2);
    let stale = manager
        .acquire_next()
        .expect("acquire failed")
        .expect("no image");

    manager.invalidate();
    manager.recreate(extent(800, 600), true).expect("recreate failed");

    match manager.present(stale.render_done, &stale) {
        Err(RenderError::StaleImage {
            image_generation,
            current,
        }) => {
            assert_eq!(image_generation, 1);
            assert_eq!(current, 2);
        }
        other => panic!("expected stale image error, got {other:?}"),
    }
}

#[test]
fn test_out_of_date_present_goes_stale() {
    let display = Rc::new(Cell::new((800, 600)));
    let mut manager = manager(&display, 2);
    let image = manager
        .acquire_next()
        .expect("acquire failed")
        .expect("no image");

    display.set((640, 480));
    assert!(!manager.present(image.render_done, &image).expect("present failed"));
    assert_eq!(manager.state(), SurfaceState::Stale);

    // No way back to Valid without a recreate.
    display.set((800, 600));
    assert!(manager.acquire_next().expect("acquire failed").is_none());
    assert_eq!(manager.state(), SurfaceState::Stale);
}

#[test]
fn test_out_of_date_acquire_goes_stale() {
    let display = Rc::new(Cell::new((800, 600)));
    let mut manager = manager(&display, 2);

    display.set((0, 0));
    assert!(manager.acquire_next().expect("acquire failed").is_none());
    assert_eq!(manager.state(), SurfaceState::Stale);
}

#[test]
fn test_failed_build_leaves_stale() {
    let display = Rc::new(Cell::new((800, 600)));
    let mut manager = manager(&display, 2);
    manager.invalidate();

    manager.surface().control().fail_next_build.set(true);
    assert!(matches!(
        manager.recreate(extent(800, 600), true),
        Err(RenderError::SurfaceRecreate(_))
    ));
    assert_eq!(manager.state(), SurfaceState::Stale);
    assert_eq!(manager.image_count(), 0);

    assert!(manager.recreate(extent(800, 600), true).expect("recreate failed").is_some());
    assert_eq!(manager.state(), SurfaceState::Valid);
    assert_eq!(manager.generation(), 2);
}

#[test]
fn test_failed_build_retires_old_images() {
    let display = Rc::new(Cell::new((800, 600)));
    let mut manager = manager(&display, 2);
    let old = manager
        .acquire_next()
        .expect("acquire failed")
        .expect("no image");
    manager.invalidate();

    manager.surface().control().fail_next_build.set(true);
    assert!(manager.recreate(extent(800, 600), true).is_err());
    assert!(!manager.is_current(&old));

    let presents = manager.surface().presents.len();
    assert!(matches!(
        manager.present(old.render_done, &old),
        Err(RenderError::StaleImage { .. })
    ));
    assert_eq!(manager.surface().presents.len(), presents);
}

#[test]
fn test_empty_rebuild_retires_old_images() {
    let display = Rc::new(Cell::new((800, 600)));
    let mut manager = manager(&display, 2);
    let old = manager
        .acquire_next()
        .expect("acquire failed")
        .expect("no image");
    manager.invalidate();

    // The window still asks for a size but the surface has none to give.
    display.set((0, 0));
    let result = manager.recreate(extent(800, 600), true).expect("recreate failed");
    assert_eq!(result, None);
    assert_eq!(manager.image_count(), 0);
    assert!(!manager.is_current(&old));
    assert!(matches!(
        manager.present(old.render_done, &old),
        Err(RenderError::StaleImage { .. })
    ));
}

#[test]
fn test_acquire_signals_rotate() {
    let display = Rc::new(Cell::new((800, 600)));
    let mut manager = manager(&display, 3);

    // Ring of max(3 frames, 3 images) + 1.
    let signals: Vec<_> = (0..8)
        .map(|_| {
            manager
                .acquire_next()
                .expect("acquire failed")
                .expect("no image")
                .available
        })
        .collect();
    assert_eq!(signals[0], signals[4]);
    assert_eq!(signals[3], signals[7]);
    assert_ne!(signals[0], signals[1]);

    let image = manager
        .acquire_next()
        .expect("acquire failed")
        .expect("no image");
    assert_ne!(image.available, image.render_done);
}

#[test]
fn test_semaphores_released() {
    let display = Rc::new(Cell::new((800, 600)));
    let surface = MockSurface::new(display.clone(), 3);
    let live = surface.live_signals();

    let mut manager = SwapchainManager::new(
        surface,
        extent(800, 600),
        true,
        2,
        Duration::from_millis(100),
    )
    .expect("Failed to create swapchain manager");
    // Three render-done signals plus a ring of four.
    assert_eq!(live.get(), 7);

    for size in [(640, 480), (1024, 768), (320, 200)] {
        display.set(size);
        manager.invalidate();
        manager
            .recreate(extent(size.0, size.1), true)
            .expect("recreate failed");
        assert_eq!(live.get(), 7);
    }

    drop(manager);
    assert_eq!(live.get(), 0);
}
