#![warn(clippy::all, missing_docs)]

//! Core domain logic for the shelf library manager.
//!
//! This crate hosts the catalog and member models, the loan ledger, the
//! flat-file codec, configuration handling and the facade used by the
//! terminal UI and any future frontends.

pub mod codec;
pub mod config;
pub mod error;
pub mod ledger;
pub mod library;
pub mod models;
pub mod save;
pub mod shared;

pub use self::config::AppConfig;
pub use codec::{DecodeReport, LoadPolicy, SkippedRecord};
pub use error::{EntityKind, LibraryError, Result};
pub use library::{Library, Loan, NewItem};
pub use models::{CatalogItem, ItemKind, Member, VariantTag};
pub use save::SaveFile;
pub use shared::SharedLibrary;
