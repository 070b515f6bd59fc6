//! Drag-and-drop reorder arithmetic.
//!
//! The gesture layer reports "`moved` was dropped where `target` sits". The
//! result is a full id list that the host hands back to the store as a
//! `ReorderSections` / `ReorderFields` action; the store then rewrites every
//! order key to the item's position.

/// Returns the id sequence after moving `moved` onto `target`'s position.
///
/// `moved` is taken out and re-inserted at the index `target` held before the
/// move, so dragging down lands after the target and dragging up lands before
/// it. Moving an item onto itself, or naming an id that is not in the list,
/// returns the list unchanged.
///
/// ```rust
/// use biodata_core::reorder::move_item;
///
/// let ids = ["A", "B", "C", "D"].map(String::from);
/// assert_eq!(move_item(&ids, "A", "C"), ["B", "C", "A", "D"]);
/// assert_eq!(move_item(&ids, "D", "B"), ["A", "D", "B", "C"]);
/// ```
pub fn move_item(ids: &[String], moved: &str, target: &str) -> Vec<String> {
    if moved == target {
        return ids.to_vec();
    }

    let from = ids.iter().position(|id| id == moved);
    let to = ids.iter().position(|id| id == target);
    let (Some(from), Some(to)) = (from, to) else {
        return ids.to_vec();
    };

    let mut result = ids.to_vec();
    let item = result.remove(from);
    result.insert(to, item);
    result
}

/// True when `candidate` holds exactly the ids of `current`, each once.
pub fn is_permutation(current: &[&str], candidate: &[String]) -> bool {
    if current.len() != candidate.len() {
        return false;
    }
    let mut expected: Vec<&str> = current.to_vec();
    let mut given: Vec<&str> = candidate.iter().map(String::as_str).collect();
    expected.sort_unstable();
    given.sort_unstable();
    expected == given && given.windows(2).all(|w| w[0] != w[1])
}
