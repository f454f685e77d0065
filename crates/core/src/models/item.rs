use std::{fmt, str::FromStr};

use crate::codec::ITEM_ROW;

/// Discriminator identifying a catalog item's specialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantTag {
    /// Plain book without extra data.
    General,
    /// Novel or story collection with a genre.
    Fiction,
    /// Reference or study work with a subject area.
    NonFiction,
}

impl VariantTag {
    /// Every tag, in the order the shell offers them.
    pub const ALL: [VariantTag; 3] = [Self::General, Self::Fiction, Self::NonFiction];

    /// Persisted spelling of the tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "GENERAL",
            Self::Fiction => "FICTION",
            Self::NonFiction => "NONFICTION",
        }
    }

    /// Label of the variant-specific field, if the variant has one.
    pub fn extra_label(self) -> Option<&'static str> {
        match self {
            Self::General => None,
            Self::Fiction => Some("Genre"),
            Self::NonFiction => Some("Subject Area"),
        }
    }
}

impl fmt::Display for VariantTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariantTag {
    type Err = String;

    /// Case-insensitive; also accepts the older `BOOK`/`FICTION_BOOK`/
    /// `NON_FICTION_BOOK` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GENERAL" | "BOOK" => Ok(Self::General),
            "FICTION" | "FICTION_BOOK" => Ok(Self::Fiction),
            "NONFICTION" | "NON_FICTION" | "NON_FICTION_BOOK" => Ok(Self::NonFiction),
            other => Err(format!("unknown variant tag '{other}'")),
        }
    }
}

/// Variant-specific data of a catalog item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    /// No extra field.
    General,
    /// Fiction with its genre.
    Fiction {
        /// e.g. "Science Fiction".
        genre: String,
    },
    /// Non-fiction with its subject area.
    NonFiction {
        /// e.g. "Astronomy".
        subject: String,
    },
}

impl ItemKind {
    /// Build the variant for `tag`, attaching `extra` where the variant has a field.
    pub fn from_tag(tag: VariantTag, extra: impl Into<String>) -> Self {
        match tag {
            VariantTag::General => Self::General,
            VariantTag::Fiction => Self::Fiction {
                genre: extra.into(),
            },
            VariantTag::NonFiction => Self::NonFiction {
                subject: extra.into(),
            },
        }
    }

    /// Discriminator of this variant.
    pub fn tag(&self) -> VariantTag {
        match self {
            Self::General => VariantTag::General,
            Self::Fiction { .. } => VariantTag::Fiction,
            Self::NonFiction { .. } => VariantTag::NonFiction,
        }
    }

    /// Genre or subject; `None` for general items.
    pub fn extra(&self) -> Option<&str> {
        match self {
            Self::General => None,
            Self::Fiction { genre } => Some(genre),
            Self::NonFiction { subject } => Some(subject),
        }
    }
}

/// One acquirable work in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    id: String,
    title: String,
    author: String,
    available: bool,
    kind: ItemKind,
}

impl CatalogItem {
    /// Create an available item.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        kind: ItemKind,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: author.into(),
            available: true,
            kind,
        }
    }

    /// Available general item.
    pub fn general(
        id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self::new(id, title, author, ItemKind::General)
    }

    /// Available fiction item.
    pub fn fiction(
        id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        genre: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            title,
            author,
            ItemKind::Fiction {
                genre: genre.into(),
            },
        )
    }

    /// Available non-fiction item.
    pub fn non_fiction(
        id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            title,
            author,
            ItemKind::NonFiction {
                subject: subject.into(),
            },
        )
    }

    /// Catalog id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Title as entered.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Author as entered.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Whether the item is on the shelf (no active loan).
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Variant with its extra field.
    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    /// Shorthand for `kind().tag()`.
    pub fn tag(&self) -> VariantTag {
        self.kind.tag()
    }

    /// Genre or subject area, if any.
    pub fn extra(&self) -> Option<&str> {
        self.kind.extra()
    }

    /// Only the ledger and load reconciliation flip availability.
    pub(crate) fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Fields of this item's persisted row, variant tag included.
    pub fn to_record(&self) -> Vec<String> {
        vec![
            ITEM_ROW.to_string(),
            self.tag().as_str().to_string(),
            self.id.clone(),
            self.title.clone(),
            self.author.clone(),
            self.available.to_string(),
            self.extra().unwrap_or_default().to_string(),
        ]
    }
}

impl fmt::Display for CatalogItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.available {
            "Available"
        } else {
            "Borrowed"
        };
        write!(
            f,
            "Title: {}, Author: {}, ID: {}, Status: {}",
            self.title, self.author, self.id, status
        )?;
        if let (Some(label), Some(extra)) = (self.tag().extra_label(), self.extra()) {
            write!(f, ", {label}: {extra}")?;
        }
        Ok(())
    }
}
