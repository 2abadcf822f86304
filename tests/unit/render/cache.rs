use super::*;
use crate::render::tile::TileOutcome;

fn rect(x: i32) -> DeviceRect {
    DeviceRect::new(x, 0, 1, 1)
}

#[test]
fn iteration_follows_insertion_order() {
    let mut info = AssemblyInfo::new();
    for id in [3u64, 1, 2] {
        info.put(BlockId(id), rect(id as i32), TileHandle::completed(TileOutcome::Empty));
    }
    let order: Vec<u64> = info.iter().map(|(id, _)| id.0).collect();
    assert_eq!(order, vec![3, 1, 2]);
    assert_eq!(info.ids(), vec![BlockId(3), BlockId(1), BlockId(2)]);
}

#[test]
fn duplicate_put_replaces_in_place() {
    let mut info = AssemblyInfo::new();
    let a = TileHandle::completed(TileOutcome::Empty);
    let b = TileHandle::completed(TileOutcome::Empty);
    info.put(BlockId(1), rect(0), a.clone());
    info.put(BlockId(2), rect(1), TileHandle::completed(TileOutcome::Empty));

    let old = info.put(BlockId(1), rect(5), b.clone()).expect("old entry");
    assert!(old.handle.same_tile(&a));
    assert_eq!(info.len(), 2);
    assert_eq!(info.ids(), vec![BlockId(1), BlockId(2)]);
    assert_eq!(info.get(BlockId(1)).unwrap().bounds, rect(5));
    assert!(info.holds(&b));
    assert!(!info.holds(&a));
}

#[test]
fn contains_and_get_miss_cleanly() {
    let info = AssemblyInfo::new();
    assert!(info.is_empty());
    assert!(!info.contains(BlockId(9)));
    assert!(info.get(BlockId(9)).is_none());
}
