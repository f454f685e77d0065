//! Loan lifecycle rules.
//!
//! The ledger owns no state. It validates a borrow or return against the
//! item and member it is handed and applies the change to both, so the
//! availability flag and the held set never disagree.

use tracing::info;

use crate::{
    error::{LibraryError, Result},
    models::{CatalogItem, Member},
};

/// Lend `item` to `member`.
///
/// Fails with [`LibraryError::AlreadyBorrowed`] if the item is out; nothing
/// is changed in that case.
pub fn borrow(item: &mut CatalogItem, member: &mut Member) -> Result<()> {
    if !item.is_available() {
        return Err(LibraryError::AlreadyBorrowed {
            item: item.id().to_string(),
        });
    }

    item.set_available(false);
    member.hold(item.id());
    info!(item = item.id(), member = member.id(), "Item borrowed");
    Ok(())
}

/// Take `item` back from `member`.
///
/// Fails with [`LibraryError::NotBorrowed`] if the item is on the shelf and
/// with [`LibraryError::NotHeldByMember`] if someone else has it.
pub fn return_item(item: &mut CatalogItem, member: &mut Member) -> Result<()> {
    if item.is_available() {
        return Err(LibraryError::NotBorrowed {
            item: item.id().to_string(),
        });
    }
    if !member.holds(item.id()) {
        return Err(LibraryError::NotHeldByMember {
            item: item.id().to_string(),
            member: member.id().to_string(),
        });
    }

    member.release(item.id());
    item.set_available(true);
    info!(item = item.id(), member = member.id(), "Item returned");
    Ok(())
}
