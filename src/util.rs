// Iteration order of these aliases is never relied upon for output; every
// public result is sorted before it leaves the crate.

#[cfg(feature = "fast-hash")]
pub type FastMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

#[cfg(feature = "fast-hash")]
pub type FastSet<T> = hashbrown::HashSet<T, ahash::RandomState>;

#[cfg(not(feature = "fast-hash"))]
pub type FastMap<K, V> = hashbrown::HashMap<K, V>;

#[cfg(not(feature = "fast-hash"))]
pub type FastSet<T> = hashbrown::HashSet<T>;
