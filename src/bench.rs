//! Timing checks for the cached allocation fast path

#[cfg(test)]
mod bench {
    use crate::{BufferPool, PoolConfig};
    use std::time::Instant;

    const SIZE: usize = 128;

    /// Route allocator logs through the test harness; RUST_LOG picks
    /// the level. Safe to call from every test, only the first wins.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Warm the thread cache with a batch of releases, then measure
    /// allocate/release cycles that should all be served by the cache.
    #[test]
    fn bench_cached_alloc_free() {
        init_tracing();
        let pool = BufferPool::new(PoolConfig {
            arenas: 1,
            ..PoolConfig::default()
        })
        .unwrap();

        // Populate: allocate and release a full cache's worth
        let warm: Vec<_> = (0..128).map(|_| pool.allocate(SIZE).unwrap()).collect();
        for buffer in &warm {
            buffer.release().unwrap();
        }

        let start = Instant::now();
        for _ in 0..10_000 {
            let buffers: Vec<_> = (0..64).map(|_| pool.allocate(SIZE).unwrap()).collect();
            for buffer in &buffers {
                buffer.release().unwrap();
            }
        }
        let elapsed = start.elapsed();
        println!("640000 cached alloc/release pairs: {:?}", elapsed);

        let stats = pool.stats();
        println!(
            "Cache stats: {} hits, {} misses, {:.2}% hit rate",
            stats.cache_hits,
            stats.cache_misses,
            stats.cache_hit_rate() * 100.0
        );
        assert!(stats.cache_hit_rate() > 0.9, "Expected >90% cache hit rate");
    }

    /// The uninitialized fast path skips the per-allocation wipe; both
    /// paths must stay on cache hits, zeroing is the only difference.
    #[test]
    fn bench_zeroing_vs_uninitialized() {
        init_tracing();
        for zero_on_allocate in [true, false] {
            let pool = BufferPool::new(PoolConfig {
                arenas: 1,
                zero_on_allocate,
                ..PoolConfig::default()
            })
            .unwrap();

            let warm = pool.allocate(SIZE).unwrap();
            warm.release().unwrap();

            let start = Instant::now();
            for _ in 0..100_000 {
                let buffer = pool.allocate(SIZE).unwrap();
                buffer.release().unwrap();
            }
            let elapsed = start.elapsed();
            println!(
                "100000 alloc/release pairs (zero_on_allocate={}): {:?}",
                zero_on_allocate, elapsed
            );
        }
    }
}
