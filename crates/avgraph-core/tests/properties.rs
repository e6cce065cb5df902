//! Property-based tests for avgraph-core.
//!
//! Covers program-time monotonicity under arbitrary timestamp regressions and
//! exactly-once release of bridged buffers whatever order the engine drops
//! their planes in.

use avgraph_core::bridge::to_native;
use avgraph_core::formats::{pixel_format_to_flow, pixel_planes};
use avgraph_core::{ClockTracker, MediaDescriptor};
use avgraph_engine::{FramePlane, PixelFormat};
use avgraph_media::{BufferAllocator, FlowDef, Rational};
use proptest::prelude::*;

fn yuv_desc(width: u64, height: u64) -> MediaDescriptor {
    let mut flow = FlowDef::picture();
    pixel_format_to_flow(PixelFormat::Yuv420p, &mut flow).unwrap();
    flow.set_hsize(width);
    flow.set_vsize(height);
    flow.set_fps(Rational::new(25, 1));
    MediaDescriptor::from_flow_def(&flow).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Any timestamp sequence, including backward jumps and repeats, yields
    /// strictly increasing program time.
    #[test]
    fn program_time_strictly_increases(
        steps in prop::collection::vec((0u64..1_000_000, any::<bool>()), 1..64),
        start in 0u64..1_000_000_000,
    ) {
        let mut tracker = ClockTracker::new();
        let mut pts = start;
        let mut last = None;
        for (delta, backward) in steps {
            pts = if backward { pts.saturating_sub(delta) } else { pts + delta };
            let stamp = tracker.stamp(Some(pts), Some(0));
            if let Some(last) = last {
                prop_assert!(stamp.pts_prog > last);
            }
            prop_assert_eq!(stamp.pts_orig, pts);
            last = Some(stamp.pts_prog);
        }
    }

    /// System time keeps the spacing of program time until a discontinuity.
    #[test]
    fn system_time_follows_program_time(
        deltas in prop::collection::vec(1u64..100_000, 1..32),
        now in 0u64..1_000_000_000,
    ) {
        let mut tracker = ClockTracker::new();
        let mut pts = 0;
        let mut first = None;
        for delta in deltas {
            pts += delta;
            let stamp = tracker.stamp(Some(pts), Some(now));
            prop_assert!(!stamp.discontinuity);
            let anchor = *first.get_or_insert(stamp.pts_prog);
            prop_assert_eq!(stamp.pts_sys, Some(now + stamp.pts_prog - anchor));
        }
    }

    /// The buffer behind a bridged frame is released once, after its last plane.
    #[test]
    fn bridged_planes_release_once_in_any_order(
        order in Just(vec![0usize, 1, 2]).prop_shuffle(),
        half_width in 1usize..32,
        half_height in 1usize..32,
    ) {
        let (width, height) = (half_width * 2, half_height * 2);
        let alloc = BufferAllocator::new();
        let planes = pixel_planes(PixelFormat::Yuv420p).unwrap();
        let buffer = alloc.picture(width, height, &planes).build();
        let frame = to_native(buffer, &yuv_desc(width as u64, height as u64)).unwrap();
        prop_assert_eq!(frame.planes.len(), 3);

        let mut slots: Vec<Option<FramePlane>> = frame.planes.into_iter().map(Some).collect();
        for (dropped, index) in order.into_iter().enumerate() {
            prop_assert_eq!(alloc.live_buffers(), 1);
            drop(slots[index].take());
            let expected = usize::from(dropped < 2);
            prop_assert_eq!(alloc.live_buffers(), expected);
        }
    }
}
