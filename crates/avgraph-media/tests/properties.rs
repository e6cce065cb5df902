//! Property-based tests for avgraph-media.
//!
//! Covers exact rational reduction and shared-storage lifetime.

use avgraph_media::rational::gcd;
use avgraph_media::{BufferAllocator, PlaneLayout, Rational};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Reduction keeps the value and leaves nothing to divide out.
    #[test]
    fn simplified_is_exact_and_reduced(num in -1_000_000i64..1_000_000, den in 1u64..1_000_000) {
        let r = Rational::new(num, den).simplified();
        prop_assert_eq!(
            i128::from(r.num) * i128::from(den),
            i128::from(num) * i128::from(r.den)
        );
        if num != 0 {
            prop_assert_eq!(gcd(r.num.unsigned_abs(), r.den), 1);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Storage stays live until its last reference goes, whatever the order.
    #[test]
    fn storage_outlives_every_share(
        order in Just((0..8usize).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let alloc = BufferAllocator::new();
        let planes = [PlaneLayout::new("y8", 1, 1, 1)];
        let first = alloc.picture(8, 8, &planes).build();
        let mut refs: Vec<_> = (0..order.len()).map(|_| Some(first.share())).collect();
        drop(first);

        for (dropped, &i) in order.iter().enumerate() {
            prop_assert_eq!(alloc.live_buffers(), 1);
            refs[i] = None;
            if dropped + 1 < order.len() {
                prop_assert!(refs.iter().flatten().all(|b| b.pic_size().is_ok()));
            }
        }
        prop_assert_eq!(alloc.live_buffers(), 0);
    }
}
