//! Minimal observable storage layer.
//!
//! The tracking core is agnostic to how reads and writes are intercepted;
//! these cells are the explicit-call mechanism the runtime's state layer
//! uses: `get` calls `Dep::depend`, `set` calls `Dep::notify`. Every
//! property owns a dep; objects and lists additionally own a
//! collection-channel dep notified on structural change (key add/remove,
//! item insertion) so deep watchers observe shape mutations too.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::dep::Dep;
use crate::value::Value;

/// A single reactive property: one value, one dep.
pub struct ObservedCell {
    dep: Rc<Dep>,
    value: RefCell<Value>,
}

impl ObservedCell {
    pub fn new(value: impl Into<Value>) -> Rc<Self> {
        Rc::new(Self {
            dep: Dep::new(),
            value: RefCell::new(value.into()),
        })
    }

    pub fn get(&self) -> Value {
        self.dep.depend();
        let value = self.value.borrow().clone();
        // Reading a reference value also collects its collection channel, so
        // structural changes to the child re-trigger this cell's readers.
        depend_child(&value);
        value
    }

    /// Read without registering a dependency.
    pub fn get_untracked(&self) -> Value {
        self.value.borrow().clone()
    }

    pub fn set(&self, value: impl Into<Value>) {
        *self.value.borrow_mut() = value.into();
        self.dep.notify();
    }

    pub fn dep(&self) -> &Rc<Dep> {
        &self.dep
    }
}

struct Field {
    dep: Rc<Dep>,
    value: Value,
}

/// A reactive keyed collection: one dep per field plus a collection channel.
pub struct ObservedObject {
    dep: Rc<Dep>,
    fields: RefCell<FxHashMap<String, Field>>,
}

impl ObservedObject {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            dep: Dep::new(),
            fields: RefCell::new(FxHashMap::default()),
        })
    }

    pub fn with<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Rc<Self>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let object = Self::new();
        {
            let mut fields = object.fields.borrow_mut();
            for (key, value) in entries {
                fields.insert(
                    key.into(),
                    Field {
                        dep: Dep::new(),
                        value: value.into(),
                    },
                );
            }
        }
        object
    }

    pub fn get(&self, key: &str) -> Value {
        let value = {
            let fields = self.fields.borrow();
            match fields.get(key) {
                Some(field) => {
                    field.dep.depend();
                    Some(field.value.clone())
                }
                // Unknown keys collect nothing; a later insert is only seen
                // through the collection channel (deep watchers, or readers
                // that touched the channel via a parent read).
                None => None,
            }
        };
        match value {
            Some(value) => {
                depend_child(&value);
                value
            }
            None => Value::Undefined,
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let existing = {
            let mut fields = self.fields.borrow_mut();
            match fields.get_mut(&key) {
                Some(field) => {
                    field.value = value;
                    Some(field.dep.clone())
                }
                None => {
                    fields.insert(
                        key,
                        Field {
                            dep: Dep::new(),
                            value,
                        },
                    );
                    None
                }
            }
        };
        match existing {
            Some(dep) => dep.notify(),
            // New key: structural change goes out on the collection channel.
            None => self.dep.notify(),
        }
    }

    pub fn remove(&self, key: &str) -> Value {
        let removed = self.fields.borrow_mut().remove(key);
        match removed {
            Some(field) => {
                self.dep.notify();
                field.value
            }
            None => Value::Undefined,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.borrow().is_empty()
    }

    pub fn dep(&self) -> &Rc<Dep> {
        &self.dep
    }

    pub(crate) fn snapshot_fields(&self) -> Vec<(Rc<Dep>, Value)> {
        self.fields
            .borrow()
            .values()
            .map(|field| (field.dep.clone(), field.value.clone()))
            .collect()
    }
}

/// A reactive sequence. Reads collect the collection channel; any mutation
/// notifies it; index-level granularity is not tracked.
pub struct ObservedList {
    dep: Rc<Dep>,
    items: RefCell<Vec<Value>>,
}

impl ObservedList {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            dep: Dep::new(),
            items: RefCell::new(Vec::new()),
        })
    }

    pub fn with<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Rc<Self> {
        let list = Self::new();
        list.items
            .borrow_mut()
            .extend(items.into_iter().map(Into::into));
        list
    }

    pub fn get(&self, index: usize) -> Value {
        self.dep.depend();
        let value = self
            .items
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or(Value::Undefined);
        depend_child(&value);
        value
    }

    pub fn len(&self) -> usize {
        self.dep.depend();
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.items.borrow_mut().push(value.into());
        self.dep.notify();
    }

    pub fn set(&self, index: usize, value: impl Into<Value>) {
        {
            let mut items = self.items.borrow_mut();
            if index >= items.len() {
                return;
            }
            items[index] = value.into();
        }
        self.dep.notify();
    }

    pub fn remove(&self, index: usize) -> Value {
        let removed = {
            let mut items = self.items.borrow_mut();
            if index >= items.len() {
                return Value::Undefined;
            }
            items.remove(index)
        };
        self.dep.notify();
        removed
    }

    pub fn dep(&self) -> &Rc<Dep> {
        &self.dep
    }

    pub(crate) fn snapshot(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }
}

/// Collect a reference value's collection channel for the current watcher.
fn depend_child(value: &Value) {
    match value {
        Value::Object(object) => object.dep.depend(),
        Value::List(list) => list.dep.depend(),
        _ => {}
    }
}
