//! Zero-value-means-unset merging.
//!
//! Every configuration level is merged field by field: an overlay field
//! replaces the base field only when the overlay value is set. Strings are
//! unset when empty, numbers when zero, lists and maps when empty, and
//! optional values when `None`.

use std::collections::BTreeMap;

/// A value that can be "unset" (its zero value).
pub trait Unset {
    fn is_unset(&self) -> bool;
}

impl Unset for String {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl Unset for i32 {
    fn is_unset(&self) -> bool {
        *self == 0
    }
}

impl Unset for u32 {
    fn is_unset(&self) -> bool {
        *self == 0
    }
}

impl<T> Unset for Option<T> {
    fn is_unset(&self) -> bool {
        self.is_none()
    }
}

impl<T> Unset for Vec<T> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> Unset for BTreeMap<K, V> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

/// Copy `overlay` into `base` when `overlay` is set.
///
/// Returns true when `base` was written.
pub fn overlay<T: Unset + Clone>(base: &mut T, overlay: &T) -> bool {
    if overlay.is_unset() {
        return false;
    }
    *base = overlay.clone();
    true
}

/// Fill `base` from `fallback` only where `base` is unset.
///
/// This is the inheritance direction: the more specific level is `base`.
pub fn inherit<T: Unset + Clone>(base: &mut T, fallback: &T) -> bool {
    if !base.is_unset() {
        return false;
    }
    overlay(base, fallback)
}

/// Field-wise merge of a whole structure.
pub trait Merge {
    /// Apply every set field of `other` on top of `self`.
    fn merge_from(&mut self, other: &Self);

    /// Fill every unset field of `self` from `parent`.
    fn inherit_from(&mut self, parent: &Self)
    where
        Self: Clone,
    {
        let mut merged = parent.clone();
        merged.merge_from(self);
        *self = merged;
    }
}

/// Merge map entries by key; entries present in both are merged with `Merge`.
pub fn merge_maps<V: Merge + Clone>(base: &mut BTreeMap<String, V>, overlay: &BTreeMap<String, V>) {
    for (key, value) in overlay {
        match base.get_mut(key) {
            Some(existing) => existing.merge_from(value),
            None => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}
