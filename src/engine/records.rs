//! Catalog record types.
//!
//! Every record serializes in camelCase exactly as it is stored, with no
//! envelope. Fields missing from older blobs fall back to their defaults.

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::engine::editor::{self, Schema};
use crate::engine::normalize::ItemRef;

// --- Kinds ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Fish,
    Item,
    MainSkill,
    SubSkill,
    SpecialMainSkill,
    Map,
    Job,
    Guide,
}

impl RecordKind {
    pub const ALL: [RecordKind; 8] = [
        RecordKind::Fish,
        RecordKind::Item,
        RecordKind::MainSkill,
        RecordKind::SubSkill,
        RecordKind::SpecialMainSkill,
        RecordKind::Map,
        RecordKind::Job,
        RecordKind::Guide,
    ];

    /// Key of the local blob holding this catalog.
    pub fn storage_key(self) -> &'static str {
        match self {
            RecordKind::Fish => "fishwiki.fish",
            RecordKind::Item => "fishwiki.items",
            RecordKind::MainSkill => "fishwiki.mainSkills",
            RecordKind::SubSkill => "fishwiki.subSkills",
            RecordKind::SpecialMainSkill => "fishwiki.specialMainSkills",
            RecordKind::Map => "fishwiki.maps",
            RecordKind::Job => "fishwiki.jobs",
            RecordKind::Guide => "fishwiki.guides",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RecordKind::Fish => "Fish",
            RecordKind::Item => "Items",
            RecordKind::MainSkill => "Main Skills",
            RecordKind::SubSkill => "Sub Skills",
            RecordKind::SpecialMainSkill => "Special Skills",
            RecordKind::Map => "Maps",
            RecordKind::Job => "Dispatch",
            RecordKind::Guide => "Guides",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "fish" => Ok(RecordKind::Fish),
            "item" | "items" => Ok(RecordKind::Item),
            "mainskill" | "mainskills" => Ok(RecordKind::MainSkill),
            "subskill" | "subskills" => Ok(RecordKind::SubSkill),
            "specialmainskill" | "specialskill" | "specialskills" => Ok(RecordKind::SpecialMainSkill),
            "map" | "maps" => Ok(RecordKind::Map),
            "job" | "jobs" | "dispatch" => Ok(RecordKind::Job),
            "guide" | "guides" => Ok(RecordKind::Guide),
            other => Err(format!("unknown record kind: {}", other)),
        }
    }
}

// --- Record trait ---

/// Shared surface of every catalog record.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Value a category filter constrains on.
    type Category: Clone + PartialEq + fmt::Display + FromStr + Send;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn name(&self) -> &str;
    fn category(&self) -> Option<Self::Category>;
    /// Fields a free-text query is matched against.
    fn search_fields(&self) -> Vec<&str>;
    fn schema() -> &'static Schema;

    /// Categories offered by the filter for this set of records.
    fn category_options(_records: &[Self]) -> Vec<Self::Category> {
        Vec::new()
    }
}

/// Category type for kinds that have no category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uncategorized {}

impl fmt::Display for Uncategorized {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl FromStr for Uncategorized {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Err(format!("this catalog has no categories (got {})", s))
    }
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub const ALL: [Rarity; 5] = [Rarity::Common, Rarity::Uncommon, Rarity::Rare, Rarity::Epic, Rarity::Legendary];

    pub fn as_str(self) -> &'static str {
        match self {
            Rarity::Common => "COMMON",
            Rarity::Uncommon => "UNCOMMON",
            Rarity::Rare => "RARE",
            Rarity::Epic => "EPIC",
            Rarity::Legendary => "LEGENDARY",
        }
    }

    pub fn stars(self) -> usize {
        self as usize + 1
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rarity::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown rarity: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    #[default]
    Material,
    Tackle,
    Lunchbox,
    Bundle,
}

impl ItemType {
    pub const ALL: [ItemType; 4] = [ItemType::Material, ItemType::Tackle, ItemType::Lunchbox, ItemType::Bundle];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Material => "MATERIAL",
            ItemType::Tackle => "TACKLE",
            ItemType::Lunchbox => "LUNCHBOX",
            ItemType::Bundle => "BUNDLE",
        }
    }

    /// Subtypes allowed in an item's `category` for this type.
    pub fn categories(self) -> &'static [&'static str] {
        match self {
            ItemType::Material => &["fish", "ore", "plant", "monster", "misc"],
            ItemType::Tackle => &["rod", "reel", "line", "float", "lure"],
            ItemType::Lunchbox => &["staple", "main", "side", "dessert"],
            ItemType::Bundle => &["bundle"],
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown item type: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillType {
    #[default]
    Passive,
    Probabilistic,
}

impl SkillType {
    pub const ALL: [SkillType; 2] = [SkillType::Passive, SkillType::Probabilistic];

    pub fn as_str(self) -> &'static str {
        match self {
            SkillType::Passive => "PASSIVE",
            SkillType::Probabilistic => "PROBABILISTIC",
        }
    }
}

impl fmt::Display for SkillType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SkillType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown skill type: {}", s))
    }
}

// --- Structs ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FishImages {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_male: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_female: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shiny_male: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shiny_female: Option<String>,
}

impl FishImages {
    /// First filled slot in normal/shiny, male/female order.
    pub fn primary(&self) -> Option<&str> {
        [&self.normal_male, &self.normal_female, &self.shiny_male, &self.shiny_female]
            .into_iter()
            .find_map(|slot| slot.as_deref())
    }

    pub fn filled(&self) -> usize {
        [&self.normal_male, &self.normal_female, &self.shiny_male, &self.shiny_female]
            .into_iter()
            .filter(|slot| slot.is_some())
            .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fish {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rarity: Rarity,
    /// Depth or location text, e.g. "Shallows 0-20m".
    pub depth: String,
    pub conditions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battle_requirement: Option<String>,
    pub tags: Vec<String>,
    pub images: FishImages,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipeEntry {
    pub ingredient_id: String,
    pub quantity: u32,
}

/// Tackle attribute bag, e.g. `power`, `control`, `luck`.
pub type TackleStats = BTreeMap<String, f64>;

/// Lunchbox flavor bag, e.g. `sweet`, `salty`.
pub type LunchboxFlavors = BTreeMap<String, u32>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BundleContents {
    pub contents: Vec<ItemRef>,
    pub substitutes: Vec<ItemRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe: Option<Vec<RecipeEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tackle: Option<TackleStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lunchbox: Option<LunchboxFlavors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<BundleContents>,
}

pub const LEVEL_SLOTS: usize = 6;

/// Per-level effect text, one slot per skill level.
pub type LevelEffects = [String; LEVEL_SLOTS];

/// Reads a level array of any length, padding or truncating to six slots.
fn deserialize_levels<'de, D>(deserializer: D) -> Result<LevelEffects, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Option<String>> = Option::<Vec<Option<String>>>::deserialize(deserializer)?.unwrap_or_default();
    let mut levels = LevelEffects::default();
    for (slot, value) in levels.iter_mut().zip(raw) {
        *slot = value.unwrap_or_default();
    }
    Ok(levels)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkillVariant {
    /// Game mode this variant documents.
    pub category: String,
    pub description: String,
    #[serde(deserialize_with = "deserialize_levels")]
    pub levels: LevelEffects,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub description: String,
    pub skill_type: SkillType,
    pub image: String,
    #[serde(deserialize_with = "deserialize_levels")]
    pub levels: LevelEffects,
    pub variants: Vec<SkillVariant>,
    /// Portrait references of partners carrying this skill.
    pub partners: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldEffect {
    pub name: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdventureMap {
    pub id: String,
    pub name: String,
    pub order: u32,
    pub image: String,
    pub field_effects: Vec<FieldEffect>,
    pub drops: Vec<ItemRef>,
    pub rewards: Vec<ItemRef>,
    pub buddies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RewardTiers {
    pub normal: Vec<ItemRef>,
    pub great: Vec<ItemRef>,
    #[serde(rename = "super")]
    pub super_: Vec<ItemRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchRequest {
    pub name: String,
    pub tags: Vec<String>,
    pub rewards: RewardTiers,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchJob {
    pub id: String,
    pub name: String,
    pub image: String,
    pub requests: Vec<DispatchRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemGuide {
    pub id: String,
    pub category: String,
    pub title: String,
    pub tags: Vec<String>,
    pub summary: String,
    pub content: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Default for SystemGuide {
    fn default() -> Self {
        Self {
            id: String::new(),
            category: String::new(),
            title: String::new(),
            tags: Vec::new(),
            summary: String::new(),
            content: String::new(),
            updated_at: Utc::now(),
        }
    }
}

// --- Record impls ---

impl Record for Fish {
    type Category = Rarity;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Option<Rarity> {
        Some(self.rarity)
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.depth.as_str(), self.id.as_str()];
        fields.extend(self.tags.iter().map(String::as_str));
        fields
    }

    fn schema() -> &'static Schema {
        &editor::FISH_SCHEMA
    }

    fn category_options(_records: &[Self]) -> Vec<Rarity> {
        Rarity::ALL.to_vec()
    }
}

impl Record for Item {
    type Category = ItemType;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Option<ItemType> {
        Some(self.item_type)
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.category.as_str(), self.id.as_str()]
    }

    fn schema() -> &'static Schema {
        &editor::ITEM_SCHEMA
    }

    fn category_options(_records: &[Self]) -> Vec<ItemType> {
        ItemType::ALL.to_vec()
    }
}

impl Record for Skill {
    type Category = SkillType;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Option<SkillType> {
        Some(self.skill_type)
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.id.as_str()];
        fields.extend(self.variants.iter().map(|v| v.category.as_str()));
        fields
    }

    fn schema() -> &'static Schema {
        &editor::SKILL_SCHEMA
    }

    fn category_options(_records: &[Self]) -> Vec<SkillType> {
        SkillType::ALL.to_vec()
    }
}

impl Record for AdventureMap {
    type Category = Uncategorized;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Option<Uncategorized> {
        None
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.id.as_str()];
        fields.extend(self.field_effects.iter().map(|e| e.name.as_str()));
        fields
    }

    fn schema() -> &'static Schema {
        &editor::MAP_SCHEMA
    }
}

impl Record for DispatchJob {
    type Category = Uncategorized;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Option<Uncategorized> {
        None
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.id.as_str()];
        for request in &self.requests {
            fields.push(request.name.as_str());
            fields.extend(request.tags.iter().map(String::as_str));
        }
        fields
    }

    fn schema() -> &'static Schema {
        &editor::JOB_SCHEMA
    }
}

impl Record for SystemGuide {
    type Category = String;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn name(&self) -> &str {
        &self.title
    }

    fn category(&self) -> Option<String> {
        Some(self.category.clone())
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str(), self.summary.as_str(), self.id.as_str()];
        fields.extend(self.tags.iter().map(String::as_str));
        fields
    }

    fn schema() -> &'static Schema {
        &editor::GUIDE_SCHEMA
    }

    fn category_options(records: &[Self]) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for guide in records {
            if !guide.category.is_empty() && !categories.contains(&guide.category) {
                categories.push(guide.category.clone());
            }
        }
        categories
    }
}
