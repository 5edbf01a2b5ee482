//! Schema-driven record editor.
//!
//! Every record kind is edited through the same [`Draft`]: a transient JSON
//! copy of the record plus the [`Schema`] that says which fields exist, how
//! their text is parsed, and which must be filled in. The catalog only sees
//! the typed record once the draft validates.

use chrono::Utc;
use rand::Rng;
use serde_json::{Map, Number, Value};

use crate::engine::error::{EditorError, ValidationError};
use crate::engine::records::{ItemType, Record, RecordKind, LEVEL_SLOTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    /// Small square icon, PNG.
    Icon,
    /// Wide photographic banner, JPEG.
    Banner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    LongText,
    Choice(&'static [&'static str]),
    /// Comma-separated strings.
    Tags,
    Integer,
    Number,
    /// `ingredientId x quantity, ...`
    Recipe,
    /// `id, id*, ...` where `*` marks a low-rate reference.
    ItemRefs,
    /// `name:percent, ...`
    Effects,
    /// `key=number, ...`
    Bag,
    /// Six level slots separated by `|`.
    Levels,
    Image(ImageRole),
    /// Raw JSON for nested structures.
    Json,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Dotted path into the record's JSON form.
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn field(key: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { key, label, kind, required: false }
}

const fn required(key: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { key, label, kind, required: true }
}

#[derive(Debug)]
pub struct Schema {
    pub kind: RecordKind,
    pub fields: &'static [FieldSpec],
    /// Ids are typed in by the editor and must not collide.
    pub unique_id: bool,
    /// Field stamped with the save time, in milliseconds.
    pub touched_at: Option<&'static str>,
}

impl Schema {
    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }
}

const RARITIES: &[&str] = &["COMMON", "UNCOMMON", "RARE", "EPIC", "LEGENDARY"];
const ITEM_TYPES: &[&str] = &["MATERIAL", "TACKLE", "LUNCHBOX", "BUNDLE"];
const SKILL_TYPES: &[&str] = &["PASSIVE", "PROBABILISTIC"];

pub static FISH_SCHEMA: Schema = Schema {
    kind: RecordKind::Fish,
    fields: &[
        required("id", "ID", FieldKind::Text),
        required("name", "Name", FieldKind::Text),
        required("rarity", "Rarity", FieldKind::Choice(RARITIES)),
        field("depth", "Depth / Location", FieldKind::Text),
        field("description", "Description", FieldKind::LongText),
        field("conditions", "Conditions", FieldKind::Tags),
        field("battleRequirement", "Battle Requirement", FieldKind::Text),
        field("tags", "Tags", FieldKind::Tags),
        field("images.normalMale", "Image (normal, male)", FieldKind::Image(ImageRole::Icon)),
        field("images.normalFemale", "Image (normal, female)", FieldKind::Image(ImageRole::Icon)),
        field("images.shinyMale", "Image (shiny, male)", FieldKind::Image(ImageRole::Icon)),
        field("images.shinyFemale", "Image (shiny, female)", FieldKind::Image(ImageRole::Icon)),
    ],
    unique_id: true,
    touched_at: None,
};

pub static ITEM_SCHEMA: Schema = Schema {
    kind: RecordKind::Item,
    fields: &[
        required("id", "ID", FieldKind::Text),
        required("name", "Name", FieldKind::Text),
        required("type", "Type", FieldKind::Choice(ITEM_TYPES)),
        field("category", "Category", FieldKind::Text),
        field("description", "Description", FieldKind::LongText),
        field("image", "Image", FieldKind::Image(ImageRole::Icon)),
        field("recipe", "Recipe", FieldKind::Recipe),
        field("tackle", "Tackle Stats", FieldKind::Bag),
        field("lunchbox", "Lunchbox Flavors", FieldKind::Bag),
        field("bundle.contents", "Bundle Contents", FieldKind::ItemRefs),
        field("bundle.substitutes", "Bundle Substitutes", FieldKind::ItemRefs),
    ],
    unique_id: false,
    touched_at: None,
};

pub static SKILL_SCHEMA: Schema = Schema {
    kind: RecordKind::MainSkill,
    fields: &[
        required("id", "ID", FieldKind::Text),
        required("name", "Name", FieldKind::Text),
        required("skillType", "Skill Type", FieldKind::Choice(SKILL_TYPES)),
        field("description", "Description", FieldKind::LongText),
        field("image", "Icon", FieldKind::Image(ImageRole::Icon)),
        field("levels", "Level Effects", FieldKind::Levels),
        field("variants", "Category Variants", FieldKind::Json),
        field("partners", "Partners", FieldKind::Tags),
    ],
    unique_id: false,
    touched_at: None,
};

pub static MAP_SCHEMA: Schema = Schema {
    kind: RecordKind::Map,
    fields: &[
        required("id", "ID", FieldKind::Text),
        required("name", "Name", FieldKind::Text),
        field("order", "Order", FieldKind::Integer),
        field("image", "Banner", FieldKind::Image(ImageRole::Banner)),
        field("fieldEffects", "Field Effects", FieldKind::Effects),
        field("drops", "Drops", FieldKind::ItemRefs),
        field("rewards", "Rewards", FieldKind::ItemRefs),
        field("buddies", "Buddies", FieldKind::Tags),
    ],
    unique_id: false,
    touched_at: None,
};

pub static JOB_SCHEMA: Schema = Schema {
    kind: RecordKind::Job,
    fields: &[
        required("id", "ID", FieldKind::Text),
        required("name", "Name", FieldKind::Text),
        field("image", "Banner", FieldKind::Image(ImageRole::Banner)),
        field("requests", "Requests", FieldKind::Json),
    ],
    unique_id: false,
    touched_at: None,
};

pub static GUIDE_SCHEMA: Schema = Schema {
    kind: RecordKind::Guide,
    fields: &[
        required("id", "ID", FieldKind::Text),
        required("category", "Category", FieldKind::Text),
        required("title", "Title", FieldKind::Text),
        field("tags", "Tags", FieldKind::Tags),
        field("summary", "Summary", FieldKind::LongText),
        field("content", "Content", FieldKind::LongText),
    ],
    unique_id: false,
    touched_at: Some("updatedAt"),
};

/// Timestamp-based id for newly created records.
pub fn generate_id() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..100);
    format!("{}{:02}", Utc::now().timestamp_millis(), suffix)
}

/// Transient editable copy of one record.
#[derive(Debug, Clone)]
pub struct Draft {
    schema: &'static Schema,
    values: Map<String, Value>,
    original_id: Option<String>,
}

impl Draft {
    /// Blank draft for a new record. Kinds without user-supplied ids get a
    /// generated one.
    pub fn create<T: Record + Default>() -> Result<Self, EditorError> {
        let schema = T::schema();
        let mut draft = Self { schema, values: to_object::<T>(&T::default(), schema.kind)?, original_id: None };
        if !schema.unique_id {
            draft.values.insert("id".to_string(), Value::String(generate_id()));
        }
        Ok(draft)
    }

    pub fn edit<T: Record>(record: &T) -> Result<Self, EditorError> {
        let schema = T::schema();
        Ok(Self {
            schema,
            values: to_object(record, schema.kind)?,
            original_id: Some(record.id().to_string()),
        })
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.schema.fields
    }

    pub fn is_new(&self) -> bool {
        self.original_id.is_none()
    }

    pub fn original_id(&self) -> Option<&str> {
        self.original_id.as_deref()
    }

    pub fn id(&self) -> &str {
        self.values.get("id").and_then(Value::as_str).unwrap_or("")
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        get_path(&self.values, key)
    }

    /// Current value of a field in the same text format `set_field` reads.
    pub fn field_text(&self, key: &str) -> String {
        let Some(spec) = self.schema.field(key) else { return String::new() };
        let Some(value) = self.value(key) else { return String::new() };
        render(spec.kind, value)
    }

    /// Parses `input` according to the field's kind and stores it. Blank input
    /// clears the field.
    pub fn set_field(&mut self, key: &str, input: &str) -> Result<(), ValidationError> {
        let spec = *self.schema.field(key).ok_or_else(|| ValidationError::UnknownField(key.to_string()))?;
        let trimmed = input.trim();
        if trimmed.is_empty() {
            remove_path(&mut self.values, key);
            return Ok(());
        }
        let value = parse(&spec, input)?;
        set_path(&mut self.values, key, value);
        Ok(())
    }

    /// Stores a value without parsing, e.g. an encoded image.
    pub fn set_raw(&mut self, key: &str, value: Value) {
        set_path(&mut self.values, key, value);
    }

    /// Every problem that blocks saving. `exists` reports whether an id is
    /// already taken in the target catalog.
    pub fn validate(&self, exists: impl Fn(&str) -> bool) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for spec in self.schema.fields.iter().filter(|f| f.required) {
            if is_blank(self.value(spec.key)) {
                errors.push(ValidationError::Missing { key: spec.key, label: spec.label });
            }
        }

        let id = self.id();
        if self.schema.unique_id && !id.is_empty() && self.original_id.as_deref() != Some(id) && exists(id) {
            errors.push(ValidationError::DuplicateId(id.to_string()));
        }

        if self.schema.kind == RecordKind::Item {
            let item_type = self.value("type").and_then(Value::as_str).and_then(|t| t.parse::<ItemType>().ok());
            let category = self.value("category").and_then(Value::as_str).unwrap_or("");
            if let (Some(item_type), false) = (item_type, category.is_empty()) {
                if !item_type.categories().contains(&category) {
                    errors.push(ValidationError::CategoryMismatch {
                        category: category.to_string(),
                        item_type: item_type.to_string(),
                    });
                }
            }
        }

        errors
    }

    /// Validates and converts the draft into its typed record.
    pub fn finish<T: Record>(mut self, exists: impl Fn(&str) -> bool) -> Result<T, EditorError> {
        let errors = self.validate(exists);
        if !errors.is_empty() {
            return Err(EditorError::Invalid(errors));
        }
        if let Some(key) = self.schema.touched_at {
            self.values.insert(key.to_string(), Value::from(Utc::now().timestamp_millis()));
        }
        let kind = self.schema.kind;
        serde_json::from_value(Value::Object(self.values)).map_err(|source| EditorError::Shape { kind, source })
    }
}

fn to_object<T: Record>(record: &T, kind: RecordKind) -> Result<Map<String, Value>, EditorError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(EditorError::Shape {
            kind,
            source: serde::de::Error::custom("record did not serialize to an object"),
        }),
        Err(source) => Err(EditorError::Shape { kind, source }),
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(_) => false,
    }
}

// --- Paths ---

fn get_path<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let mut current = map.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn set_path(map: &mut Map<String, Value>, key: &str, value: Value) {
    match key.split_once('.') {
        None => {
            map.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let child = map.entry(head.to_string()).or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(child) = child {
                set_path(child, rest, value);
            }
        }
    }
}

fn remove_path(map: &mut Map<String, Value>, key: &str) {
    match key.split_once('.') {
        None => {
            map.remove(key);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(child)) = map.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}

// --- Text formats ---

fn entries(input: &str) -> impl Iterator<Item = &str> {
    input.split(',').map(str::trim).filter(|e| !e.is_empty())
}

fn bad_list(spec: &FieldSpec, input: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::BadList { key: spec.key, label: spec.label, input: input.trim().to_string(), reason: reason.into() }
}

fn parse_number(spec: &FieldSpec, text: &str) -> Result<Value, ValidationError> {
    let text = text.trim().trim_end_matches('%').trim();
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Value::from(n));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| ValidationError::NotANumber { key: spec.key, label: spec.label, input: text.to_string() })
}

fn parse(spec: &FieldSpec, input: &str) -> Result<Value, ValidationError> {
    let trimmed = input.trim();
    match spec.kind {
        FieldKind::Text | FieldKind::Image(_) => Ok(Value::String(trimmed.to_string())),
        FieldKind::LongText => Ok(Value::String(input.trim_end().to_string())),
        FieldKind::Choice(options) => options
            .iter()
            .find(|o| o.eq_ignore_ascii_case(trimmed))
            .map(|o| Value::String(o.to_string()))
            .ok_or_else(|| ValidationError::BadChoice {
                key: spec.key,
                label: spec.label,
                input: trimmed.to_string(),
                options: options.join("/"),
            }),
        FieldKind::Tags => Ok(Value::Array(entries(input).map(|e| Value::String(e.to_string())).collect())),
        FieldKind::Integer => trimmed
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| ValidationError::NotANumber { key: spec.key, label: spec.label, input: trimmed.to_string() }),
        FieldKind::Number => parse_number(spec, trimmed),
        FieldKind::Recipe => {
            let mut rows = Vec::new();
            for entry in entries(input) {
                let (id, quantity) = match entry.rsplit_once(" x ") {
                    Some((id, qty)) => {
                        let qty = qty.trim().parse::<u32>().map_err(|_| bad_list(spec, input, format!("bad quantity in \"{}\"", entry)))?;
                        (id.trim(), qty)
                    }
                    None => (entry, 1),
                };
                let mut row = Map::new();
                row.insert("ingredientId".to_string(), Value::String(id.to_string()));
                row.insert("quantity".to_string(), Value::from(quantity));
                rows.push(Value::Object(row));
            }
            Ok(Value::Array(rows))
        }
        FieldKind::ItemRefs => Ok(Value::Array(
            entries(input)
                .map(|entry| {
                    let (id, low) = match entry.strip_suffix('*') {
                        Some(id) => (id.trim(), true),
                        None => (entry, false),
                    };
                    let mut row = Map::new();
                    row.insert("id".to_string(), Value::String(id.to_string()));
                    row.insert("isLowRate".to_string(), Value::Bool(low));
                    Value::Object(row)
                })
                .collect(),
        )),
        FieldKind::Effects => {
            let mut rows = Vec::new();
            for entry in entries(input) {
                let (name, pct) = entry
                    .rsplit_once(':')
                    .ok_or_else(|| bad_list(spec, input, format!("\"{}\" needs name:percent", entry)))?;
                let mut row = Map::new();
                row.insert("name".to_string(), Value::String(name.trim().to_string()));
                row.insert("percentage".to_string(), parse_number(spec, pct)?);
                rows.push(Value::Object(row));
            }
            Ok(Value::Array(rows))
        }
        FieldKind::Bag => {
            let mut bag = Map::new();
            for entry in entries(input) {
                let (key, number) = entry
                    .split_once('=')
                    .ok_or_else(|| bad_list(spec, input, format!("\"{}\" needs key=value", entry)))?;
                bag.insert(key.trim().to_string(), parse_number(spec, number)?);
            }
            Ok(Value::Object(bag))
        }
        FieldKind::Levels => {
            let slots: Vec<&str> = input.split('|').map(str::trim).collect();
            if slots.len() > LEVEL_SLOTS {
                return Err(bad_list(spec, input, format!("at most {} levels", LEVEL_SLOTS)));
            }
            let mut levels = vec![Value::String(String::new()); LEVEL_SLOTS];
            for (slot, text) in levels.iter_mut().zip(slots) {
                *slot = Value::String(text.to_string());
            }
            Ok(Value::Array(levels))
        }
        FieldKind::Json => serde_json::from_str(trimmed).map_err(|e| bad_list(spec, input, e.to_string())),
    }
}

fn render(kind: FieldKind, value: &Value) -> String {
    let text = |v: &Value| match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    let list = |v: &Value| v.as_array().cloned().unwrap_or_default();

    match kind {
        FieldKind::Text | FieldKind::LongText | FieldKind::Choice(_) | FieldKind::Integer | FieldKind::Number => text(value),
        FieldKind::Image(_) => {
            let reference = text(value);
            if reference.starts_with("data:") {
                format!("[embedded image, {} bytes]", reference.len())
            } else {
                reference
            }
        }
        FieldKind::Tags => list(value).iter().map(text).collect::<Vec<_>>().join(", "),
        FieldKind::Recipe => list(value)
            .iter()
            .map(|row| format!("{} x {}", text(&row["ingredientId"]), text(&row["quantity"])))
            .collect::<Vec<_>>()
            .join(", "),
        FieldKind::ItemRefs => list(value)
            .iter()
            .filter_map(crate::engine::normalize::normalize_value)
            .map(|r| if r.is_low_rate { format!("{}*", r.id) } else { r.id })
            .collect::<Vec<_>>()
            .join(", "),
        FieldKind::Effects => list(value)
            .iter()
            .map(|row| format!("{}:{}", text(&row["name"]), text(&row["percentage"])))
            .collect::<Vec<_>>()
            .join(", "),
        FieldKind::Bag => value
            .as_object()
            .map(|bag| bag.iter().map(|(k, v)| format!("{}={}", k, text(v))).collect::<Vec<_>>().join(", "))
            .unwrap_or_default(),
        FieldKind::Levels => list(value).iter().map(text).collect::<Vec<_>>().join(" | "),
        FieldKind::Json => value.to_string(),
    }
}
