//! Order-preserving bounded-concurrency map.

use futures::stream::{self, StreamExt};
use std::future::Future;

/// Apply `f` to every item with at most `limit` futures in flight.
///
/// Items are pulled lazily from `items`. Output order matches input order
/// regardless of completion order. A `limit` of 0 is treated as 1.
pub async fn map_with_concurrency<T, I, O, F, Fut>(items: T, limit: usize, f: F) -> Vec<O>
where
    T: IntoIterator<Item = I>,
    F: FnMut(I) -> Fut,
    Fut: Future<Output = O>,
{
    stream::iter(items)
        .map(f)
        .buffered(limit.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_limit_and_order_hold() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<u64> = (0..25).collect();

        let out = map_with_concurrency(items, 10, |i| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                // Later items finish first.
                tokio::time::sleep(Duration::from_millis(30 - i)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                i * 2
            }
        })
        .await;

        assert_eq!(out, (0..25).map(|i| i * 2).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 10);
        assert_eq!(peak.load(Ordering::SeqCst), 10);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_limit_runs_sequentially() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let out = map_with_concurrency(vec!["a", "b", "c"], 0, |s| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                s.to_uppercase()
            }
        })
        .await;
        assert_eq!(out, vec!["A", "B", "C"]);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lazy_range_input() {
        let out = map_with_concurrency((1..=5u64).rev(), 2, |x| async move { x * 10 }).await;
        assert_eq!(out, vec![50, 40, 30, 20, 10]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let out: Vec<u8> = map_with_concurrency(Vec::<u8>::new(), 10, |x| async move { x }).await;
        assert!(out.is_empty());
    }
}
