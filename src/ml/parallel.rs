use std::collections::VecDeque;
use std::sync::mpsc::channel;
use std::sync::Mutex;

/// Run `job` over `work` on scoped worker threads, keeping input order.
///
/// Errors are collected per item; the first failing item (by input index)
/// is returned.
pub(crate) fn map_ordered<T, R, F>(work: Vec<T>, job: F) -> Result<Vec<R>, String>
where
    T: Send,
    R: Send,
    F: Fn(T) -> Result<R, String> + Sync,
{
    if work.is_empty() {
        return Ok(Vec::new());
    }
    let total = work.len();
    let worker_count = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(total)
        .max(1);
    let queue = Mutex::new(work.into_iter().enumerate().collect::<VecDeque<_>>());
    let (tx, rx) = channel();

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let queue = &queue;
            let tx = tx.clone();
            let job = &job;
            scope.spawn(move || {
                loop {
                    let next = match queue.lock() {
                        Ok(mut guard) => guard.pop_front(),
                        Err(_) => return,
                    };
                    let Some((idx, item)) = next else {
                        break;
                    };
                    if tx.send((idx, job(item))).is_err() {
                        return;
                    }
                }
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<Result<R, String>>> = (0..total).map(|_| None).collect();
    for (idx, result) in rx {
        slots[idx] = Some(result);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| slot.unwrap_or_else(|| Err(format!("Worker dropped job {idx}"))))
        .collect()
}
