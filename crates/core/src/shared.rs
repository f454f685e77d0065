//! Handle for sharing one library between threads.

use std::{path::Path, sync::Arc};

use parking_lot::Mutex;

use crate::{
    codec::{DecodeReport, LoadPolicy},
    error::Result,
    library::{Library, Loan, NewItem},
    models::{CatalogItem, Member},
};

/// Cloneable handle that funnels every operation through one lock.
///
/// For callers that share one library across threads, such as a network
/// frontend or a background autosaver. The single-threaded shell owns its
/// [`Library`] directly.
///
/// A borrow and a return racing on the same item are applied one after the
/// other, never interleaved.
#[derive(Clone, Default)]
pub struct SharedLibrary {
    inner: Arc<Mutex<Library>>,
}

impl SharedLibrary {
    /// Share an existing library.
    pub fn new(library: Library) -> Self {
        Self {
            inner: Arc::new(Mutex::new(library)),
        }
    }

    /// Run `f` with exclusive access to the library.
    pub fn with<R>(&self, f: impl FnOnce(&mut Library) -> R) -> R {
        let mut library = self.inner.lock();
        f(&mut library)
    }

    /// See [`Library::add_item`].
    pub fn add_item(&self, request: NewItem) -> Result<String> {
        self.inner.lock().add_item(request)
    }

    /// See [`Library::add_member`].
    pub fn add_member(&self, name: &str, id: Option<&str>) -> Result<String> {
        self.inner.lock().add_member(name, id)
    }

    /// See [`Library::borrow`].
    pub fn borrow(&self, item_id: &str, member_id: &str) -> Result<()> {
        self.inner.lock().borrow(item_id, member_id)
    }

    /// See [`Library::return_item`].
    pub fn return_item(&self, item_id: &str, member_id: &str) -> Result<()> {
        self.inner.lock().return_item(item_id, member_id)
    }

    /// Copy of the current catalog.
    pub fn items(&self) -> Vec<CatalogItem> {
        self.inner.lock().items().to_vec()
    }

    /// Copy of the current member roll.
    pub fn members(&self) -> Vec<Member> {
        self.inner.lock().members().to_vec()
    }

    /// Snapshot of the active loans.
    pub fn loans(&self) -> Vec<Loan> {
        self.inner.lock().loans()
    }

    /// Encode under the lock and write the snapshot to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.inner.lock().save(path)
    }

    /// Replace the shared state with the contents of `path`.
    pub fn reload(&self, path: impl AsRef<Path>, policy: LoadPolicy) -> Result<DecodeReport> {
        let mut library = self.inner.lock();
        let (loaded, report) = Library::load(path, policy)?;
        *library = loaded;
        Ok(report)
    }
}
