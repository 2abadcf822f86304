use super::*;
use crate::foundation::core::DeviceRect;
use crate::render::block::BlockId;

fn queue_with(n: usize) -> (PassQueue, Vec<CancelToken>) {
    let mut q = PassQueue::new();
    let mut tokens = Vec::new();
    for _ in 0..n {
        let seq = q.next_seq();
        let t = CancelToken::new();
        q.enqueue(seq, t.clone(), Vec::new());
        tokens.push(t);
    }
    (q, tokens)
}

fn seqs(q: &PassQueue) -> Vec<u64> {
    q.snapshot().into_iter().map(|(s, _)| s).collect()
}

#[test]
fn sequence_numbers_strictly_increase() {
    let mut q = PassQueue::new();
    let a = q.next_seq();
    let b = q.next_seq();
    let c = q.next_seq();
    assert!(a < b && b < c);
}

#[test]
fn mark_running_only_moves_queued_outstanding_passes() {
    let (mut q, _) = queue_with(2);
    assert!(q.mark_running(0));
    assert!(!q.mark_running(0));
    assert!(!q.mark_running(7));
    assert_eq!(
        q.snapshot(),
        vec![(0, PassState::Running), (1, PassState::Queued)]
    );
}

#[test]
fn cancel_outstanding_sweeps_everything() {
    let (mut q, tokens) = queue_with(3);
    let cancelled = q.cancel_outstanding(&AssemblyInfo::new());
    assert_eq!(cancelled, vec![0, 1, 2]);
    assert_eq!(q.len(), 0);
    assert!(tokens.iter().all(CancelToken::is_cancelled));
}

#[test]
fn cancelling_a_pass_spares_tiles_the_cache_still_holds() {
    let mut q = PassQueue::new();
    let kept = TileHandle::pending();
    let dropped = TileHandle::pending();
    let seq = q.next_seq();
    q.enqueue(seq, CancelToken::new(), vec![kept.clone(), dropped.clone()]);

    let mut cache = AssemblyInfo::new();
    cache.put(BlockId(1), DeviceRect::new(0, 0, 1, 1), kept.clone());
    q.cancel_outstanding(&cache);

    assert!(!kept.cancel_token().is_cancelled());
    assert!(dropped.cancel_token().is_cancelled());
}

#[test]
fn cancel_after_newer_done_sweeps_older_passes() {
    let (mut q, tokens) = queue_with(4);
    let cancelled = q.retire(
        2,
        PassState::Completed,
        CancelPolicy::CancelAfterNewerDone,
        &AssemblyInfo::new(),
    );
    assert_eq!(cancelled, vec![0, 1]);
    assert_eq!(seqs(&q), vec![3]);
    assert!(tokens[0].is_cancelled());
    assert!(tokens[1].is_cancelled());
    assert!(!tokens[2].is_cancelled());
    assert!(!tokens[3].is_cancelled());
}

#[test]
fn retirement_on_an_already_swept_queue_is_a_no_op() {
    let (mut q, _) = queue_with(2);
    let cache = AssemblyInfo::new();

    // Pass 1 finishes first and sweeps pass 0 along with itself.
    q.retire(1, PassState::Completed, CancelPolicy::CancelAfterNewerDone, &cache);
    assert_eq!(q.len(), 0);

    // Pass 0's own retirement then runs against an empty queue.
    let cancelled = q.retire(0, PassState::Cancelled, CancelPolicy::CancelAfterNewerDone, &cache);
    assert!(cancelled.is_empty());
    assert_eq!(q.len(), 0);
}

#[test]
fn retirement_of_a_swept_pass_leaves_newer_passes_alone() {
    let (mut q, tokens) = queue_with(3);
    let cache = AssemblyInfo::new();
    q.retire(1, PassState::Completed, CancelPolicy::CancelAfterNewerDone, &cache);
    assert_eq!(seqs(&q), vec![2]);

    let cancelled = q.retire(0, PassState::Cancelled, CancelPolicy::CancelAfterNewerDone, &cache);
    assert!(cancelled.is_empty());
    assert_eq!(seqs(&q), vec![2]);
    assert!(!tokens[2].is_cancelled());
}

#[test]
fn no_cancel_retires_out_of_order_without_cancelling() {
    let (mut q, tokens) = queue_with(3);
    let cache = AssemblyInfo::new();
    let cancelled = q.retire(2, PassState::Completed, CancelPolicy::NoCancel, &cache);
    assert!(cancelled.is_empty());
    assert_eq!(seqs(&q), vec![0, 1]);
    q.retire(0, PassState::Completed, CancelPolicy::NoCancel, &cache);
    assert_eq!(seqs(&q), vec![1]);
    assert!(tokens.iter().all(|t| !t.is_cancelled()));
}

#[test]
fn failed_pass_also_triggers_the_sweep() {
    let (mut q, tokens) = queue_with(2);
    let cancelled = q.retire(
        1,
        PassState::Failed,
        CancelPolicy::CancelAfterNewerDone,
        &AssemblyInfo::new(),
    );
    assert_eq!(cancelled, vec![0]);
    assert!(tokens[0].is_cancelled());
}

#[test]
fn policies_parse_from_config_names() {
    assert_eq!(
        "cancel_after_newer_done".parse::<CancelPolicy>().unwrap(),
        CancelPolicy::CancelAfterNewerDone
    );
    assert_eq!("none".parse::<CancelPolicy>().unwrap(), CancelPolicy::NoCancel);
    assert!("sometimes".parse::<CancelPolicy>().is_err());
    assert_eq!(CancelPolicy::default(), CancelPolicy::CancelBeforeExecNewer);
    assert!(PassState::Failed.is_terminal());
    assert!(!PassState::Running.is_terminal());
}
