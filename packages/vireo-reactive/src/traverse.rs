use rustc_hash::FxHashSet;

use crate::dep::DepId;
use crate::value::Value;

/// Recursively touch every reactive cell nested in `value` so they all
/// register the currently collecting watcher. Runs inside `Watcher::get`
/// while the watcher still occupies the collecting slot.
///
/// The seen-set is keyed by collection-channel dep id, which both dedupes
/// shared children and terminates on cyclic structures.
pub fn traverse(value: &Value) {
    let mut seen: FxHashSet<DepId> = FxHashSet::default();
    walk(value, &mut seen);
}

fn walk(value: &Value, seen: &mut FxHashSet<DepId>) {
    match value {
        Value::Object(object) => {
            if !seen.insert(object.dep().id()) {
                return;
            }
            object.dep().depend();
            for (dep, nested) in object.snapshot_fields() {
                dep.depend();
                walk(&nested, seen);
            }
        }
        Value::List(list) => {
            if !seen.insert(list.dep().id()) {
                return;
            }
            list.dep().depend();
            for item in list.snapshot() {
                walk(&item, seen);
            }
        }
        _ => {}
    }
}
