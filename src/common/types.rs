use std::sync::Arc;

use parking_lot::Mutex;

/// A thread-safe, mutually exclusive shared component.
///
/// Effect stages and sources are held this way so a handle kept by the
/// rack and a handle sitting in the chain refer to the same live node.
pub type Shared<T> = Arc<Mutex<T>>;
