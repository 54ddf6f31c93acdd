//! Hash collections used throughout the crate.
//!
//! Keys are small integers and bundle id strings, so the fast non-DoS-resistant
//! hasher is fine everywhere.

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<K> = rustc_hash::FxHashSet<K>;
