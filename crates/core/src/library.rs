//! The library facade: the one entry point callers use.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::{
    codec::{self, DecodeReport, LoadPolicy},
    error::{EntityKind, LibraryError, Result},
    ledger,
    models::{normalize_text, validate_id, CatalogItem, ItemKind, Member},
    save::SaveFile,
};

/// Prefix of generated item ids.
pub const ITEM_ID_PREFIX: &str = "B";
/// Prefix of generated member ids.
pub const MEMBER_ID_PREFIX: &str = "M";

static GENERATED_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]+)(\d+)$").expect("failed to compile generated id regex"));

/// Request to add an item to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    /// Variant with its extra field.
    pub kind: ItemKind,
    /// Title, trimmed on insert.
    pub title: String,
    /// Author, trimmed on insert.
    pub author: String,
    /// Explicit id such as an ISBN; generated when `None`.
    pub id: Option<String>,
}

impl NewItem {
    /// Request with a generated id.
    pub fn new(kind: ItemKind, title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            author: author.into(),
            id: None,
        }
    }

    /// Use `id` instead of a generated identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// An item currently out with a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loan {
    /// The borrowed item.
    pub item_id: String,
    /// The member holding it.
    pub member_id: String,
}

/// Owns the catalog and the member roll.
#[derive(Debug, Clone, Default)]
pub struct Library {
    items: Vec<CatalogItem>,
    members: Vec<Member>,
}

impl Library {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when there are neither items nor members.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.members.is_empty()
    }

    /// Add an item and return its id.
    pub fn add_item(&mut self, request: NewItem) -> Result<String> {
        let title = normalize_text("title", &request.title)?;
        let author = normalize_text("author", &request.author)?;
        let kind = match request.kind {
            ItemKind::General => ItemKind::General,
            ItemKind::Fiction { genre } => ItemKind::Fiction {
                genre: normalize_text("genre", &genre)?,
            },
            ItemKind::NonFiction { subject } => ItemKind::NonFiction {
                subject: normalize_text("subject", &subject)?,
            },
        };

        let id = match request.id {
            Some(id) => {
                let id = id.trim().to_string();
                validate_id("item id", &id)?;
                if self.items.iter().any(|item| item.id() == id) {
                    return Err(LibraryError::DuplicateId {
                        kind: EntityKind::Item,
                        id,
                    });
                }
                id
            }
            None => next_id(
                "item id",
                ITEM_ID_PREFIX,
                self.items.iter().map(CatalogItem::id),
            )?,
        };

        info!(item = %id, title = %title, variant = %kind.tag(), "Item added");
        self.items.push(CatalogItem::new(id.clone(), title, author, kind));
        Ok(id)
    }

    /// Register a member and return their id.
    pub fn add_member(&mut self, name: &str, id: Option<&str>) -> Result<String> {
        let name = normalize_text("name", name)?;
        let id = match id.map(str::trim) {
            Some(id) => {
                validate_id("member id", id)?;
                if self.members.iter().any(|member| member.id() == id) {
                    return Err(LibraryError::DuplicateId {
                        kind: EntityKind::Member,
                        id: id.to_string(),
                    });
                }
                id.to_string()
            }
            None => next_id(
                "member id",
                MEMBER_ID_PREFIX,
                self.members.iter().map(Member::id),
            )?,
        };

        info!(member = %id, name = %name, "Member added");
        self.members.push(Member::new(id.clone(), name));
        Ok(id)
    }

    /// All items in catalog order.
    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    /// All members in registration order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Look up an item by id.
    pub fn item(&self, id: &str) -> Result<&CatalogItem> {
        self.items
            .iter()
            .find(|item| item.id() == id)
            .ok_or_else(|| not_found(EntityKind::Item, id))
    }

    /// Look up a member by id.
    pub fn member(&self, id: &str) -> Result<&Member> {
        self.members
            .iter()
            .find(|member| member.id() == id)
            .ok_or_else(|| not_found(EntityKind::Member, id))
    }

    /// The member currently holding `item_id`, if it is out.
    pub fn holder_of(&self, item_id: &str) -> Option<&Member> {
        self.members.iter().find(|member| member.holds(item_id))
    }

    /// Active loans, grouped by member.
    pub fn loans(&self) -> Vec<Loan> {
        self.members
            .iter()
            .flat_map(|member| {
                member.held().iter().map(move |item_id| Loan {
                    item_id: item_id.clone(),
                    member_id: member.id().to_string(),
                })
            })
            .collect()
    }

    /// Lend `item_id` to `member_id`.
    pub fn borrow(&mut self, item_id: &str, member_id: &str) -> Result<()> {
        let member = find_mut(&mut self.members, EntityKind::Member, member_id, Member::id)?;
        let item = find_mut(&mut self.items, EntityKind::Item, item_id, CatalogItem::id)?;
        ledger::borrow(item, member)
    }

    /// Take `item_id` back from `member_id`.
    pub fn return_item(&mut self, item_id: &str, member_id: &str) -> Result<()> {
        let member = find_mut(&mut self.members, EntityKind::Member, member_id, Member::id)?;
        let item = find_mut(&mut self.items, EntityKind::Item, item_id, CatalogItem::id)?;
        ledger::return_item(item, member)
    }

    /// Serialize the whole library to rows.
    pub fn encode(&self) -> Result<String> {
        codec::encode(&self.items, &self.members)
    }

    /// Rebuild a library from rows.
    pub fn decode(input: &str, policy: LoadPolicy) -> Result<(Self, DecodeReport)> {
        let decoded = codec::decode(input, policy)?;
        let library = Self {
            items: decoded.items,
            members: decoded.members,
        };
        Ok((library, decoded.report))
    }

    /// Write the library to `path`, replacing its previous contents.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        SaveFile::new(path).write(&self.encode()?)?;
        info!(
            path = %path.display(),
            items = self.items.len(),
            members = self.members.len(),
            "Library saved"
        );
        Ok(())
    }

    /// Read the library from `path`. A missing file is an error.
    pub fn load(path: impl AsRef<Path>, policy: LoadPolicy) -> Result<(Self, DecodeReport)> {
        let path = path.as_ref();
        let contents = SaveFile::new(path).read()?;
        let (library, report) = Self::decode(&contents, policy)?;
        info!(
            path = %path.display(),
            items = library.items.len(),
            members = library.members.len(),
            skipped = report.skipped.len(),
            repaired = report.repaired.len(),
            "Library loaded"
        );
        Ok((library, report))
    }

    /// Like [`Library::load`], but a missing file gives an empty library.
    pub fn open(path: impl AsRef<Path>, policy: LoadPolicy) -> Result<(Self, DecodeReport)> {
        let path = path.as_ref();
        if !SaveFile::new(path).exists() {
            info!(path = %path.display(), "No library file yet; starting empty");
            return Ok((Self::new(), DecodeReport::default()));
        }
        Self::load(path, policy)
    }

    /// Fill an empty library with a small sample catalog and member roll.
    ///
    /// Returns `false` and changes nothing if the library already has data.
    pub fn seed_demo(&mut self) -> Result<bool> {
        if !self.is_empty() {
            return Ok(false);
        }

        let books = [
            NewItem::new(
                ItemKind::General,
                "The Hitchhiker's Guide to the Galaxy",
                "Douglas Adams",
            )
            .with_id("978-0345391803"),
            NewItem::new(
                ItemKind::Fiction {
                    genre: "Science Fiction".to_string(),
                },
                "Dune",
                "Frank Herbert",
            )
            .with_id("978-0441172719"),
            NewItem::new(
                ItemKind::NonFiction {
                    subject: "Astronomy".to_string(),
                },
                "Cosmos",
                "Carl Sagan",
            )
            .with_id("978-0345539434"),
            NewItem::new(ItemKind::General, "Python Crash Course", "Eric Matthes")
                .with_id("978-1593279288"),
            NewItem::new(ItemKind::General, "Clean Code", "Robert C. Martin")
                .with_id("978-0132350884"),
        ];
        for book in books {
            self.add_item(book)?;
        }
        for (id, name) in [
            ("M001", "Bob Johnson"),
            ("M002", "Carol White"),
            ("M003", "David Green"),
        ] {
            self.add_member(name, Some(id))?;
        }
        Ok(true)
    }
}

fn not_found(kind: EntityKind, id: &str) -> LibraryError {
    LibraryError::NotFound {
        kind,
        id: id.to_string(),
    }
}

fn find_mut<'a, T>(
    entries: &'a mut [T],
    kind: EntityKind,
    id: &str,
    id_of: fn(&T) -> &str,
) -> Result<&'a mut T> {
    entries
        .iter_mut()
        .find(|entry| id_of(entry) == id)
        .ok_or_else(|| not_found(kind, id))
}

/// Next free `<prefix><n>` id, continuing after the highest number in use.
/// One past the highest `prefix`-numbered id in `existing`.
fn next_id<'a>(
    field: &'static str,
    prefix: &str,
    existing: impl Iterator<Item = &'a str>,
) -> Result<String> {
    let highest = existing
        .filter_map(|id| GENERATED_ID_RE.captures(id))
        .filter(|caps| &caps[1] == prefix)
        .filter_map(|caps| caps[2].parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    let next = highest
        .checked_add(1)
        .ok_or_else(|| LibraryError::InvalidInput {
            field,
            reason: format!("no generated ids left after {prefix}{highest}; pass an explicit id"),
        })?;
    Ok(format!("{prefix}{next:04}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dune() -> NewItem {
        NewItem::new(
            ItemKind::Fiction {
                genre: "Sci-Fi".to_string(),
            },
            "Dune",
            "Herbert",
        )
        .with_id("F1")
    }

    #[test]
    fn borrow_and_return_scenario() -> Result<()> {
        let mut library = Library::new();
        let f1 = library.add_item(dune())?;
        let m1 = library.add_member("Alice", Some("M1"))?;

        library.borrow(&f1, &m1)?;
        assert!(!library.item(&f1)?.is_available());
        assert!(library.member(&m1)?.holds(&f1));

        let err = library.borrow(&f1, &m1).unwrap_err();
        assert!(matches!(err, LibraryError::AlreadyBorrowed { .. }));

        library.return_item(&f1, &m1)?;
        assert!(library.item(&f1)?.is_available());
        assert!(library.member(&m1)?.held().is_empty());

        let err = library.return_item(&f1, &m1).unwrap_err();
        assert!(matches!(err, LibraryError::NotBorrowed { .. }));
        Ok(())
    }

    #[test]
    fn unknown_ids_are_not_found() -> Result<()> {
        let mut library = Library::new();
        let f1 = library.add_item(dune())?;
        let m1 = library.add_member("Alice", None)?;

        let err = library.borrow("nope", &m1).unwrap_err();
        assert!(matches!(
            err,
            LibraryError::NotFound { kind: EntityKind::Item, ref id } if id == "nope"
        ));
        let err = library.return_item(&f1, "ghost").unwrap_err();
        assert!(matches!(
            err,
            LibraryError::NotFound {
                kind: EntityKind::Member,
                ..
            }
        ));
        assert!(library.item(&f1)?.is_available());
        Ok(())
    }

    #[test]
    fn generated_ids_continue_after_load() -> Result<()> {
        let mut library = Library::new();
        let first = library.add_item(NewItem::new(ItemKind::General, "A", "X"))?;
        let second = library.add_item(NewItem::new(ItemKind::General, "B", "X"))?;
        assert_eq!((first.as_str(), second.as_str()), ("B0001", "B0002"));

        let (mut reloaded, _) = Library::decode(&library.encode()?, LoadPolicy::Abort)?;
        assert_eq!(
            reloaded.add_item(NewItem::new(ItemKind::General, "C", "X"))?,
            "B0003"
        );
        assert_eq!(reloaded.add_member("Alice", None)?, "M0001");
        assert_eq!(reloaded.add_member("Bob", Some("M0041"))?, "M0041");
        assert_eq!(reloaded.add_member("Carol", None)?, "M0042");
        Ok(())
    }

    #[test]
    fn exhausted_id_sequence_is_an_error() -> Result<()> {
        let mut library = Library::new();
        library.add_item(NewItem::new(ItemKind::General, "Last", "X").with_id("B4294967295"))?;
        let err = library
            .add_item(NewItem::new(ItemKind::General, "Next", "X"))
            .unwrap_err();
        assert!(matches!(err, LibraryError::InvalidInput { field: "item id", .. }));
        assert_eq!(library.items().len(), 1);

        library.add_member("Max", Some("M4294967295"))?;
        assert!(library.add_member("Overflow", None).is_err());

        library.add_item(NewItem::new(ItemKind::General, "Manual", "X").with_id("B7"))?;
        let (reloaded, _) = Library::decode(&library.encode()?, LoadPolicy::Abort)?;
        assert_eq!(reloaded.items().len(), 2);
        Ok(())
    }

    #[test]
    fn duplicates_and_blank_fields_are_rejected() -> Result<()> {
        let mut library = Library::new();
        library.add_item(dune())?;
        assert!(matches!(
            library.add_item(dune()).unwrap_err(),
            LibraryError::DuplicateId {
                kind: EntityKind::Item,
                ..
            }
        ));
        assert!(matches!(
            library
                .add_item(NewItem::new(ItemKind::General, "  ", "X"))
                .unwrap_err(),
            LibraryError::InvalidInput { field: "title", .. }
        ));
        assert!(matches!(
            library
                .add_item(NewItem::new(
                    ItemKind::NonFiction {
                        subject: String::new()
                    },
                    "Cosmos",
                    "Sagan"
                ))
                .unwrap_err(),
            LibraryError::InvalidInput {
                field: "subject",
                ..
            }
        ));
        library.add_member("Alice", Some("M1"))?;
        assert!(library.add_member("Alicia", Some("M1")).is_err());
        assert!(library.add_member("", None).is_err());
        assert_eq!(library.items().len(), 1);
        assert_eq!(library.members().len(), 1);
        Ok(())
    }

    #[test]
    fn loans_are_derived_from_held_sets() -> Result<()> {
        let mut library = Library::new();
        library.seed_demo()?;
        library.borrow("978-0441172719", "M001")?;
        library.borrow("978-0132350884", "M002")?;

        assert_eq!(
            library.loans(),
            vec![
                Loan {
                    item_id: "978-0441172719".to_string(),
                    member_id: "M001".to_string()
                },
                Loan {
                    item_id: "978-0132350884".to_string(),
                    member_id: "M002".to_string()
                },
            ]
        );
        assert_eq!(
            library.holder_of("978-0132350884").map(Member::id),
            Some("M002")
        );
        assert!(library.holder_of("978-0345539434").is_none());
        Ok(())
    }

    #[test]
    fn seed_only_fills_an_empty_library() -> Result<()> {
        let mut library = Library::new();
        assert!(library.seed_demo()?);
        assert_eq!(library.items().len(), 5);
        assert_eq!(library.members().len(), 3);
        assert!(!library.seed_demo()?);
        assert_eq!(library.items().len(), 5);
        Ok(())
    }

    #[test]
    fn save_load_and_open() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("library.csv");

        let (empty, report) = Library::open(&path, LoadPolicy::Abort)?;
        assert!(empty.is_empty());
        assert_eq!(report, DecodeReport::default());
        assert!(matches!(
            Library::load(&path, LoadPolicy::Abort).unwrap_err(),
            LibraryError::Io { .. }
        ));

        let mut library = Library::new();
        library.seed_demo()?;
        library.borrow("978-0441172719", "M003")?;
        library.save(&path)?;

        let (loaded, report) = Library::open(&path, LoadPolicy::Abort)?;
        assert_eq!(report.rows, 8);
        assert_eq!(loaded.items(), library.items());
        assert_eq!(loaded.members(), library.members());
        assert_eq!(loaded.encode()?, library.encode()?);
        Ok(())
    }
}
