//! Property tests for display ordering and body decoding.
//!
//! Uses proptest to verify:
//! 1. Any sequence of drag moves followed by renumbering leaves a dense,
//!    settled sequence that still holds every task exactly once.
//! 2. A reorder batch built from any permutation numbers tasks by index.
//! 3. Random bytes never cause a panic in `decode` (returns `Err` gracefully).

use proptest::prelude::*;
use taskflow_proto::codec;
use taskflow_proto::order::{ReorderRequest, array_move, is_dense, is_settled, renumber};
use taskflow_proto::task::{Priority, Task, TaskId};

fn make_tasks(n: usize) -> Vec<Task> {
    (0..n)
        .zip(0_i64..)
        .map(|(_, i)| Task {
            id: TaskId::new(i + 1),
            title: format!("Task {}", i + 1),
            description: String::new(),
            priority: Priority::Medium,
            completed: false,
            sort_order: i,
            due_date: None,
            created_at: None,
        })
        .collect()
}

proptest! {
    #[test]
    fn moves_then_renumber_stay_dense(
        n in 0usize..30,
        moves in prop::collection::vec((0usize..40, 0usize..40), 0..20),
    ) {
        let mut tasks = make_tasks(n);
        for (from, to) in moves {
            array_move(&mut tasks, from, to);
            renumber(&mut tasks);
            prop_assert!(is_dense(&tasks));
            prop_assert!(is_settled(&tasks));
        }
        let mut ids: Vec<i64> = tasks.iter().map(|t| t.id.get()).collect();
        ids.sort_unstable();
        let expected: Vec<i64> = (1..).take(n).collect();
        prop_assert_eq!(ids, expected);
    }

    #[test]
    fn reorder_batch_matches_sequence(
        order in Just((0..12).collect::<Vec<usize>>()).prop_shuffle(),
    ) {
        let base = make_tasks(order.len());
        let shuffled: Vec<Task> = order.iter().map(|&i| base[i].clone()).collect();
        let req = ReorderRequest::from_sequence(&shuffled);
        prop_assert_eq!(req.task_orders.len(), shuffled.len());
        for ((entry, task), index) in req.task_orders.iter().zip(&shuffled).zip(0_i64..) {
            prop_assert_eq!(entry.id, task.id);
            prop_assert_eq!(entry.sort_order, index);
        }
    }

    #[test]
    fn decode_random_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = codec::decode::<Vec<Task>>(&bytes);
        let _ = codec::decode::<ReorderRequest>(&bytes);
    }
}
