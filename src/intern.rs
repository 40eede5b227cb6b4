//! Process-wide string pool used to intern `Pathsplit` components.
//!
//! Modeled on the `OnceCell<Arc<Mutex<_>>>` static pattern used for
//! `BOOTLOADER_BUILD`/`APP`/`TERMINAL` in the original kernel build tool: a
//! single lazily-initialized, lock-guarded table that every device and path
//! lives behind. Entries are append-only and outlive all references, so a
//! returned `Interned` handle is valid for the life of the process.

use std::collections::HashMap;
use std::sync::Arc;

use conquer_once::spin::OnceCell;
use parking_lot::Mutex;

/// An interned string: cheap to clone and compare (pointer + length under the
/// hood via `Arc<str>`), but still derefs to `&str` for ordinary use.
pub type Interned = Arc<str>;

static POOL: OnceCell<Mutex<HashMap<Box<str>, Interned>>> = OnceCell::uninit();

fn pool() -> &'static Mutex<HashMap<Box<str>, Interned>> {
    POOL.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Interns `s`, returning the shared handle. Repeated calls with an
/// equal string return `Arc`s pointing at the same allocation.
pub fn intern(s: &str) -> Interned {
    let mut table = pool().lock();
    if let Some(existing) = table.get(s) {
        return existing.clone();
    }
    let interned: Interned = Arc::from(s);
    table.insert(Box::from(s), interned.clone());
    interned
}

/// Number of distinct strings interned so far. Exposed for tests and
/// diagnostics only.
pub fn len() -> usize {
    pool().lock().len()
}
