//! Record validation
//!
//! Turns raw JSON records into typed, normalized records. Problems are
//! collected per field instead of stopping at the first one, and never raise.

use serde_json::{Map, Value};

use crate::domain::normalize::chapter_title;
use crate::domain::{FieldErrors, NormalizedName, normalize_name, normalize_title};

pub const DEFAULT_EDITION: &str = "Original";
pub const MAX_RATING: f64 = 99.9;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const NOT_A_STRING: &str = "Not a valid string.";

/// One publisher edition of a book record
#[derive(Debug, Clone, PartialEq)]
pub struct EditionRecord {
    pub publisher: NormalizedName,
    pub translation: bool,
    pub edition: String,
}

/// A book record that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct BookRecord {
    pub title: NormalizedName,
    pub author: NormalizedName,
    pub synopsis: String,
    pub rating: f64,
    pub views: i64,
    pub genres: Vec<NormalizedName>,
    pub editions: Vec<EditionRecord>,
    pub book_cover: Option<String>,
}

/// How a chapter names its book
#[derive(Debug, Clone, PartialEq)]
pub enum BookReference {
    Id(i32),
    Title(NormalizedName),
}

/// A chapter record that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterRecord {
    pub book: BookReference,
    pub title: String,
    pub content: Option<String>,
    pub file_path: Option<String>,
    pub chapter_number: Option<i32>,
}

/// Split a request body into records: an array is a batch, anything else one record.
pub fn one_or_many(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, FieldErrors> {
    value.as_object().ok_or_else(|| {
        let mut errors = FieldErrors::new();
        errors.insert(
            "non_field_errors".to_string(),
            vec![format!(
                "Invalid data. Expected an object, but got {}.",
                type_name(value)
            )],
        );
        errors
    })
}

/// Field reader that records every problem it runs into
struct Fields<'a> {
    map: &'a Map<String, Value>,
    errors: FieldErrors,
}

impl<'a> Fields<'a> {
    fn new(map: &'a Map<String, Value>) -> Self {
        Self {
            map,
            errors: FieldErrors::new(),
        }
    }

    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Present and not null
    fn get(&self, field: &str) -> Option<&'a Value> {
        self.map.get(field).filter(|v| !v.is_null())
    }

    fn has(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    fn required_name(&mut self, field: &str) -> Option<NormalizedName> {
        match self.get(field) {
            None => {
                self.error(field, REQUIRED);
                None
            }
            Some(value) => self.name_value(field, value),
        }
    }

    /// A name given either as a string or as `{"name": ...}`
    fn name_value(&mut self, field: &str, value: &Value) -> Option<NormalizedName> {
        let raw = match value {
            Value::String(s) => s.as_str(),
            Value::Object(obj) => match obj.get("name") {
                Some(Value::String(s)) => s.as_str(),
                _ => {
                    self.error(field, "Expected a string or an object with a \"name\".");
                    return None;
                }
            },
            _ => {
                self.error(field, NOT_A_STRING);
                return None;
            }
        };

        let normalized = normalize_name(raw);
        if normalized.is_none() {
            self.error(field, BLANK);
        }
        normalized
    }

    fn required_text(&mut self, field: &str) -> Option<String> {
        match self.get(field) {
            None => {
                self.error(field, REQUIRED);
                None
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                self.error(field, BLANK);
                None
            }
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(_) => {
                self.error(field, NOT_A_STRING);
                None
            }
        }
    }

    /// Blank strings count as absent
    fn optional_text(&mut self, field: &str) -> Option<String> {
        match self.get(field) {
            None => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(_) => {
                self.error(field, NOT_A_STRING);
                None
            }
        }
    }

    fn required_number(&mut self, field: &str) -> Option<f64> {
        let parsed = match self.get(field) {
            None => {
                self.error(field, REQUIRED);
                return None;
            }
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };

        match parsed {
            Some(n) if n.is_finite() => Some(n),
            _ => {
                self.error(field, "A valid number is required.");
                None
            }
        }
    }

    fn integer_value(&mut self, field: &str, value: &Value) -> Option<i64> {
        let parsed = match value {
            Value::Number(n) => n.as_i64().or_else(|| {
                // Whole floats only, and only inside i64 range; `as` would saturate
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        if parsed.is_none() {
            self.error(field, "A valid integer is required.");
        }
        parsed
    }

    fn required_integer(&mut self, field: &str) -> Option<i64> {
        match self.get(field) {
            None => {
                self.error(field, REQUIRED);
                None
            }
            Some(value) => self.integer_value(field, value),
        }
    }

    fn optional_integer(&mut self, field: &str) -> Option<i64> {
        let value = self.get(field)?;
        self.integer_value(field, value)
    }

    fn optional_bool(&mut self, field: &str, default: bool) -> bool {
        match self.get(field) {
            None => default,
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    self.error(field, "Must be a valid boolean.");
                    default
                }
            },
            Some(Value::Number(n)) if n.as_i64() == Some(0) => false,
            Some(Value::Number(n)) if n.as_i64() == Some(1) => true,
            Some(_) => {
                self.error(field, "Must be a valid boolean.");
                default
            }
        }
    }

    fn finish<T>(self, record: Option<T>) -> Result<T, FieldErrors> {
        match record {
            Some(record) if self.errors.is_empty() => Ok(record),
            _ => Err(self.errors),
        }
    }
}

/// Validate and normalize a book record
pub fn validate_book(value: &Value) -> Result<BookRecord, FieldErrors> {
    let map = as_object(value)?;
    let mut fields = Fields::new(map);

    let title = match fields.get("title") {
        None => {
            fields.error("title", REQUIRED);
            None
        }
        Some(Value::String(s)) => {
            let title = normalize_title(s);
            if title.is_none() {
                fields.error("title", BLANK);
            }
            title
        }
        Some(_) => {
            fields.error("title", NOT_A_STRING);
            None
        }
    };
    let author = fields.required_name("author");
    let synopsis = fields.required_text("synopsis");

    let rating = fields.required_number("rating").and_then(|r| {
        let rounded = (r * 10.0).round() / 10.0;
        if rounded < 0.0 {
            fields.error("rating", "Ensure this value is greater than or equal to 0.");
            None
        } else if rounded > MAX_RATING {
            fields.error(
                "rating",
                format!("Ensure this value is less than or equal to {}.", MAX_RATING),
            );
            None
        } else {
            Some(rounded)
        }
    });

    let views = fields.required_integer("views").and_then(|v| {
        if v < 0 {
            fields.error("views", "Ensure this value is greater than or equal to 0.");
            None
        } else {
            Some(v)
        }
    });

    let genres = book_genres(&mut fields);
    let editions = book_editions(&mut fields);
    let book_cover = fields.optional_text("book_cover");

    let record = match (title, author, synopsis, rating, views) {
        (Some(title), Some(author), Some(synopsis), Some(rating), Some(views)) => {
            Some(BookRecord {
                title,
                author,
                synopsis,
                rating,
                views,
                genres,
                editions,
                book_cover,
            })
        }
        _ => None,
    };

    fields.finish(record)
}

/// `genres` as a list, or a single `genre`; duplicates collapse to the first spelling
fn book_genres(fields: &mut Fields<'_>) -> Vec<NormalizedName> {
    let mut genres: Vec<NormalizedName> = Vec::new();
    let mut push = |name: NormalizedName| {
        if !genres.iter().any(|g| g.key == name.key) {
            genres.push(name);
        }
    };

    match fields.get("genres") {
        None => {}
        Some(Value::Array(items)) => {
            for item in items {
                if let Some(name) = fields.name_value("genres", item) {
                    push(name);
                }
            }
        }
        Some(other) => fields.error(
            "genres",
            format!("Expected a list of items but got type \"{}\".", type_name(other)),
        ),
    }

    if let Some(single) = fields.get("genre") {
        if let Some(name) = fields.name_value("genre", single) {
            push(name);
        }
    }

    genres
}

/// A flat `publisher` with optional `translation`/`edition`, plus any `publishers` list.
///
/// Repeated (publisher, edition) pairs collapse to the first one.
fn book_editions(fields: &mut Fields<'_>) -> Vec<EditionRecord> {
    let mut editions: Vec<EditionRecord> = Vec::new();

    if fields.has("publisher") {
        let publisher = fields.required_name("publisher");
        let translation = fields.optional_bool("translation", false);
        let edition = fields
            .optional_text("edition")
            .unwrap_or_else(|| DEFAULT_EDITION.to_string());
        if let Some(publisher) = publisher {
            editions.push(EditionRecord {
                publisher,
                translation,
                edition,
            });
        }
    }

    match fields.get("publishers") {
        None => {}
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                let Some(obj) = item.as_object() else {
                    fields.error(
                        "publishers",
                        format!("Item {}: expected an object, got {}.", i, type_name(item)),
                    );
                    continue;
                };
                let mut nested = Fields::new(obj);
                let publisher = nested.required_name("publisher");
                let translation = nested.optional_bool("translation", false);
                let edition = nested
                    .optional_text("edition")
                    .unwrap_or_else(|| DEFAULT_EDITION.to_string());

                for (field, messages) in std::mem::take(&mut nested.errors) {
                    for message in messages {
                        fields.error(&format!("publishers.{}.{}", i, field), message);
                    }
                }
                if let Some(publisher) = publisher {
                    editions.push(EditionRecord {
                        publisher,
                        translation,
                        edition,
                    });
                }
            }
        }
        Some(other) => fields.error(
            "publishers",
            format!("Expected a list of items but got type \"{}\".", type_name(other)),
        ),
    }

    let mut unique: Vec<EditionRecord> = Vec::with_capacity(editions.len());
    for edition in editions {
        if !unique
            .iter()
            .any(|e| e.publisher.key == edition.publisher.key && e.edition == edition.edition)
        {
            unique.push(edition);
        }
    }
    unique
}

/// Validate a chapter record
pub fn validate_chapter(value: &Value) -> Result<ChapterRecord, FieldErrors> {
    let map = as_object(value)?;
    let mut fields = Fields::new(map);

    let book_field = if fields.has("book") { "book" } else { "book_id" };
    let book = if let Some(raw) = fields.get(book_field) {
        let id = fields.integer_value(book_field, raw);
        match id.map(i32::try_from) {
            Some(Ok(id)) => Some(BookReference::Id(id)),
            Some(Err(_)) => {
                fields.error(book_field, "Invalid pk - object does not exist.");
                None
            }
            None => None,
        }
    } else if fields.has("book_title") {
        fields.required_name("book_title").map(BookReference::Title)
    } else {
        fields.error("book", REQUIRED);
        None
    };

    let title = match fields.get("title") {
        None => {
            fields.error("title", REQUIRED);
            None
        }
        Some(Value::String(s)) => {
            let title = chapter_title(s);
            if title.is_none() {
                fields.error("title", BLANK);
            }
            title
        }
        Some(_) => {
            fields.error("title", NOT_A_STRING);
            None
        }
    };

    let content = fields.optional_text("content");
    let file_path = fields.optional_text("file");
    if content.is_none() && file_path.is_none() && !fields.errors.contains_key("content") {
        fields.error("content", "Either content or file is required.");
    }

    let chapter_number = fields
        .optional_integer("chapter_number")
        .and_then(|n| match i32::try_from(n) {
            Ok(n) if n >= 0 => Some(n),
            _ => {
                fields.error(
                    "chapter_number",
                    "Ensure this value is a non-negative integer.",
                );
                None
            }
        });

    let record = match (book, title) {
        (Some(book), Some(title)) => Some(ChapterRecord {
            book,
            title,
            content,
            file_path,
            chapter_number,
        }),
        _ => None,
    };

    fields.finish(record)
}
