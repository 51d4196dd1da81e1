use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Floating point values that can be accumulated concurrently through their bit pattern.
pub trait AtomicFloat: Copy + Sized {
    type Atomic: Send + Sync;

    fn as_atomic(data: &mut [Self]) -> &[Self::Atomic];

    fn fetch_add(slot: &Self::Atomic, value: Self);
}

macro_rules! atomic_float {
    ($float: ty, $bits: ty, $atomic: ty) => {
        const _: () = assert!(
            std::mem::size_of::<$float>() == std::mem::size_of::<$atomic>()
                && std::mem::align_of::<$float>() == std::mem::align_of::<$atomic>()
        );

        impl AtomicFloat for $float {
            type Atomic = $atomic;

            #[inline]
            fn as_atomic(data: &mut [Self]) -> &[Self::Atomic] {
                // SAFETY: size and alignment agree (checked at compile time above) and the
                // exclusive borrow rules out any non-atomic access while the view is alive.
                unsafe { &*(data as *mut [$float] as *const [$atomic]) }
            }

            #[inline]
            fn fetch_add(slot: &Self::Atomic, value: Self) {
                // the closure always returns `Some`, so the update cannot fail
                let _ = slot.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                    let sum = bytemuck::cast::<$bits, $float>(bits) + value;
                    Some(bytemuck::cast::<$float, $bits>(sum))
                });
            }
        }
    };
}

atomic_float!(f32, u32, AtomicU32);
atomic_float!(f64, u64, AtomicU64);

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn concurrent_adds_are_not_lost() {
        let mut data = vec![0.0f64; 4];
        {
            let atomics = f64::as_atomic(&mut data);
            (0..10_000).into_par_iter().for_each(|n| {
                f64::fetch_add(&atomics[n % 4], 0.5);
            });
        }
        assert_eq!(data, vec![1250.0; 4]);
    }

    #[test]
    fn single_precision_accumulates() {
        let mut data = vec![1.0f32; 2];
        {
            let atomics = f32::as_atomic(&mut data);
            f32::fetch_add(&atomics[1], 2.5);
        }
        assert_eq!(data, vec![1.0, 3.5]);
    }
}
