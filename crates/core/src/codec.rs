//! Flat-file row codec for the full library state.
//!
//! Every item and every member becomes one comma separated row:
//!
//! ```text
//! ITEM,<GENERAL|FICTION|NONFICTION>,<id>,<title>,<author>,<true|false>,<extra>
//! MEMBER,<id>,<name>,<held ids joined by ';'>
//! ```
//!
//! Loans are not stored on their own. On decode the member held sets are
//! the source of truth and every item's availability is recomputed from
//! them, whatever flag the item row carried.

use std::{
    collections::{HashMap, HashSet},
    io,
};

use csv::{Position, QuoteStyle, ReaderBuilder, Terminator, Trim, WriterBuilder};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    error::{LibraryError, Result},
    models::{validate_id, CatalogItem, ItemKind, Member, VariantTag, HELD_DELIMITER},
};

/// Leading field of an item row.
pub const ITEM_ROW: &str = "ITEM";
/// Leading field of a member row.
pub const MEMBER_ROW: &str = "MEMBER";

const ITEM_FIELDS: usize = 7;
const MEMBER_FIELDS: usize = 4;
const COMMENT: u8 = b'#';
const HEADER: &str = "\
# ITEM,VARIANT,ID,TITLE,AUTHOR,AVAILABLE,EXTRA
# MEMBER,ID,NAME,HELD_IDS
";

/// What to do when a row cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPolicy {
    /// Fail the whole load on the first corrupt record.
    #[default]
    Abort,
    /// Drop the corrupt record, log it and keep going.
    Skip,
}

/// A record dropped under [`LoadPolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// 1-based line number in the input.
    pub line: usize,
    /// The raw line.
    pub content: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Bookkeeping produced alongside a successful decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeReport {
    /// Number of data rows read (comments and blank lines excluded).
    pub rows: usize,
    /// Records dropped under [`LoadPolicy::Skip`].
    pub skipped: Vec<SkippedRecord>,
    /// Items whose stored availability disagreed with the held sets.
    pub repaired: Vec<String>,
}

/// Entities reconstructed from persisted rows.
#[derive(Debug, Default)]
pub struct Decoded {
    /// Items in file order.
    pub items: Vec<CatalogItem>,
    /// Members in file order, held sets reconciled.
    pub members: Vec<Member>,
    /// Load details.
    pub report: DecodeReport,
}

/// Serialize items then members, one row each, after a comment header.
///
/// Fields holding a comma or a quote are quoted, with `""` for a literal quote.
pub fn encode(items: &[CatalogItem], members: &[Member]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(HEADER.as_bytes().to_vec());

    let records = items
        .iter()
        .map(CatalogItem::to_record)
        .chain(members.iter().map(Member::to_record));
    for record in records {
        writer.write_record(&record).map_err(LibraryError::Encode)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| LibraryError::Encode(err.into_error().into()))?;
    String::from_utf8(bytes).map_err(|err| {
        LibraryError::Encode(io::Error::new(io::ErrorKind::InvalidData, err).into())
    })
}

/// Rebuild items and members from `input`.
///
/// Lines starting with `#` and blank lines are ignored. Unquoted and quoted
/// fields alike are trimmed.
pub fn decode(input: &str, policy: LoadPolicy) -> Result<Decoded> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .comment(Some(COMMENT))
        .from_reader(input.as_bytes());

    let mut decoder = Decoder::new(policy);
    for result in reader.records() {
        match result {
            Ok(record) => {
                if record.iter().all(str::is_empty) {
                    continue;
                }
                let (line, raw) = locate(input, record.position());
                let fields = record.iter().map(str::to_string).collect::<Vec<_>>();
                decoder.row(line, raw, &fields)?;
            }
            Err(err) => {
                let (line, raw) = locate(input, err.position());
                decoder.report.rows += 1;
                decoder.reject(line, raw, err.to_string())?;
            }
        }
    }
    decoder.finish()
}

/// Line number and first source line of the record starting at `position`.
fn locate<'a>(input: &'a str, position: Option<&Position>) -> (usize, &'a str) {
    let Some(position) = position else {
        return (0, "");
    };
    let raw = usize::try_from(position.byte())
        .ok()
        .and_then(|start| input.get(start..))
        .and_then(|rest| rest.lines().next())
        .unwrap_or_default();
    (usize::try_from(position.line()).unwrap_or(usize::MAX), raw)
}

enum Row {
    Item {
        item: CatalogItem,
        stored_available: bool,
    },
    Member {
        member: Member,
        held: Vec<String>,
    },
}

struct PendingMember {
    member: Member,
    held: Vec<String>,
    line: usize,
    content: String,
}

struct Decoder {
    policy: LoadPolicy,
    report: DecodeReport,
    items: Vec<CatalogItem>,
    stored_available: Vec<bool>,
    item_ids: HashSet<String>,
    members: Vec<PendingMember>,
    member_ids: HashSet<String>,
}

impl Decoder {
    fn new(policy: LoadPolicy) -> Self {
        Self {
            policy,
            report: DecodeReport::default(),
            items: Vec::new(),
            stored_available: Vec::new(),
            item_ids: HashSet::new(),
            members: Vec::new(),
            member_ids: HashSet::new(),
        }
    }

    fn row(&mut self, line: usize, raw: &str, fields: &[String]) -> Result<()> {
        self.report.rows += 1;
        match parse_row(fields) {
            Ok(Row::Item {
                item,
                stored_available,
            }) => {
                if !self.item_ids.insert(item.id().to_string()) {
                    return self.reject(line, raw, format!("duplicate item id '{}'", item.id()));
                }
                self.items.push(item);
                self.stored_available.push(stored_available);
            }
            Ok(Row::Member { member, held }) => {
                if !self.member_ids.insert(member.id().to_string()) {
                    return self.reject(
                        line,
                        raw,
                        format!("duplicate member id '{}'", member.id()),
                    );
                }
                self.members.push(PendingMember {
                    member,
                    held,
                    line,
                    content: raw.to_string(),
                });
            }
            Err(reason) => return self.reject(line, raw, reason),
        }
        Ok(())
    }

    fn reject(&mut self, line: usize, content: &str, reason: String) -> Result<()> {
        match self.policy {
            LoadPolicy::Abort => Err(LibraryError::corrupt(line, content, reason)),
            LoadPolicy::Skip => {
                warn!(line, %reason, "Skipping corrupt record");
                self.report.skipped.push(SkippedRecord {
                    line,
                    content: content.to_string(),
                    reason,
                });
                Ok(())
            }
        }
    }

    /// Attach held ids to members and derive every item's availability from them.
    fn finish(mut self) -> Result<Decoded> {
        let pending = std::mem::take(&mut self.members);
        let mut holders: HashMap<String, String> = HashMap::new();
        let mut members = Vec::with_capacity(pending.len());

        for PendingMember {
            mut member,
            held,
            line,
            content,
        } in pending
        {
            for item_id in held {
                if !self.item_ids.contains(&item_id) {
                    self.reject(
                        line,
                        &content,
                        format!("held item '{item_id}' has no item row"),
                    )?;
                    continue;
                }
                match holders.get(&item_id) {
                    Some(holder) if holder != member.id() => {
                        let reason =
                            format!("item '{item_id}' is already held by member '{holder}'");
                        self.reject(line, &content, reason)?;
                    }
                    _ => {
                        holders.insert(item_id.clone(), member.id().to_string());
                        member.hold(&item_id);
                    }
                }
            }
            members.push(member);
        }

        for (item, stored) in self.items.iter_mut().zip(&self.stored_available) {
            let available = !holders.contains_key(item.id());
            if available != *stored {
                debug!(item = item.id(), stored, available, "Availability repaired from held sets");
                self.report.repaired.push(item.id().to_string());
            }
            item.set_available(available);
        }

        Ok(Decoded {
            items: self.items,
            members,
            report: self.report,
        })
    }
}

fn parse_row(fields: &[String]) -> std::result::Result<Row, String> {
    if fields.iter().any(|field| field.contains(['\n', '\r'])) {
        return Err("quoted field spans several lines".to_string());
    }
    let row_type = fields
        .first()
        .map(|field| field.to_ascii_uppercase())
        .unwrap_or_default();
    match row_type.as_str() {
        ITEM_ROW => parse_item(fields),
        MEMBER_ROW => parse_member(fields),
        other => Err(format!("unknown row type '{other}'")),
    }
}

fn parse_item(fields: &[String]) -> std::result::Result<Row, String> {
    let [_, tag, id, title, author, available, extra] = fields else {
        return Err(format!(
            "item row needs {ITEM_FIELDS} fields, found {}",
            fields.len()
        ));
    };

    let tag: VariantTag = tag.parse()?;
    validate_id("item id", id).map_err(|err| err.to_string())?;
    if title.trim().is_empty() {
        return Err("empty title".to_string());
    }
    if author.trim().is_empty() {
        return Err("empty author".to_string());
    }
    let stored_available = parse_flag(available)?;
    match (tag.extra_label(), extra.trim().is_empty()) {
        (Some(label), true) => return Err(format!("{tag} item is missing its {label}")),
        (None, false) => return Err(format!("{tag} item must not carry an extra field")),
        _ => {}
    }

    let item = CatalogItem::new(
        id.as_str(),
        title.as_str(),
        author.as_str(),
        ItemKind::from_tag(tag, extra.as_str()),
    );
    Ok(Row::Item {
        item,
        stored_available,
    })
}

fn parse_member(fields: &[String]) -> std::result::Result<Row, String> {
    let [_, id, name, held] = fields else {
        return Err(format!(
            "member row needs {MEMBER_FIELDS} fields, found {}",
            fields.len()
        ));
    };

    validate_id("member id", id).map_err(|err| err.to_string())?;
    if name.trim().is_empty() {
        return Err("empty member name".to_string());
    }
    let held = held
        .split(HELD_DELIMITER)
        .map(str::trim)
        .filter(|item_id| !item_id.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    for item_id in &held {
        validate_id("held item id", item_id).map_err(|err| err.to_string())?;
    }

    Ok(Row::Member {
        member: Member::new(id.as_str(), name.as_str()),
        held,
    })
}

fn parse_flag(raw: &str) -> std::result::Result<bool, String> {
    if raw.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(format!("availability must be true or false, found '{raw}'"))
    }
}
