mod common;

use common::strategies::*;
use magazine_resilience::queue::task_fn;
use magazine_resilience::{RetryConfig, TaskError, WorkItem, WorkQueue, WorkQueueConfig};
use proptest::prelude::*;
use std::time::Duration;

fn idle_queue(capacity: usize) -> WorkQueue<u32> {
    // Built outside a runtime, so no workers drain it
    WorkQueue::new(
        "property",
        WorkQueueConfig {
            max_queue_size: capacity,
            max_workers: 1,
            ..Default::default()
        },
    )
}

fn item(index: usize, priority: i32) -> WorkItem<u32> {
    WorkItem::new(
        format!("item-{index}"),
        task_fn(|| async { Ok::<u32, TaskError>(0) }),
        priority,
        0,
        Duration::from_secs(1),
    )
}

proptest! {
    /// Property: the queue never holds more than its capacity
    #[test]
    fn queue_never_exceeds_capacity(
        capacity in capacity_strategy(),
        priorities in priority_sequence_strategy(),
    ) {
        let queue = idle_queue(capacity);
        for (index, priority) in priorities.iter().enumerate() {
            prop_assert!(queue.enqueue(item(index, *priority)));
            prop_assert!(queue.len() <= capacity);
        }

        let expected_evictions = priorities.len().saturating_sub(capacity) as u64;
        prop_assert_eq!(queue.evicted_count(), expected_evictions);
    }

    /// Property: survivors are the newest arrivals, ordered by priority then arrival
    #[test]
    fn eviction_drops_oldest_and_dispatch_order_is_stable(
        capacity in capacity_strategy(),
        priorities in priority_sequence_strategy(),
    ) {
        let queue = idle_queue(capacity);
        for (index, priority) in priorities.iter().enumerate() {
            queue.enqueue(item(index, *priority));
        }

        let first_survivor = priorities.len().saturating_sub(capacity);
        let mut expected: Vec<(i32, usize)> = priorities
            .iter()
            .enumerate()
            .skip(first_survivor)
            .map(|(index, priority)| (*priority, index))
            .collect();
        expected.sort();
        let expected_ids: Vec<String> = expected
            .into_iter()
            .map(|(_, index)| format!("item-{index}"))
            .collect();

        prop_assert_eq!(queue.pending_ids(), expected_ids);
    }

    /// Property: attempt timeouts never shrink from one attempt to the next
    #[test]
    fn attempt_timeouts_are_non_decreasing((max_retries, initial_ms, factor) in retry_settings_strategy()) {
        let config = RetryConfig::new(max_retries, Duration::from_millis(initial_ms), factor);
        prop_assert!(config.validate().is_ok());

        let timeouts = config.attempt_timeouts();
        prop_assert_eq!(timeouts.len() as u32, max_retries + 1);
        prop_assert_eq!(timeouts[0], Duration::from_millis(initial_ms));
        for pair in timeouts.windows(2) {
            prop_assert!(pair[1] >= pair[0]);
        }
    }
}
