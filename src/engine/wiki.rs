use anyhow::Result;
use log::{info, warn};
use std::str::FromStr;

use crate::engine::cards::{Card, CardView, DetailLine};
use crate::engine::catalog::{Catalog, ChangeHook, SaveOutcome};
use crate::engine::database::Database;
use crate::engine::editor::Draft;
use crate::engine::error::EditorError;
use crate::engine::filter::{filter_records, CategoryFilter};
use crate::engine::normalize::{display_ref, ItemRef};
use crate::engine::records::{AdventureMap, DispatchJob, Fish, Item, Record, RecordKind, Skill, SystemGuide};
use crate::engine::seed;

/// Runs `$body` with `$cat` bound to the catalog for `$kind`.
macro_rules! with_catalog {
    ($wiki:expr, $kind:expr, |$cat:ident| $body:expr) => {
        match $kind {
            RecordKind::Fish => { let $cat = &$wiki.fish; $body }
            RecordKind::Item => { let $cat = &$wiki.items; $body }
            RecordKind::MainSkill => { let $cat = &$wiki.main_skills; $body }
            RecordKind::SubSkill => { let $cat = &$wiki.sub_skills; $body }
            RecordKind::SpecialMainSkill => { let $cat = &$wiki.special_skills; $body }
            RecordKind::Map => { let $cat = &$wiki.maps; $body }
            RecordKind::Job => { let $cat = &$wiki.jobs; $body }
            RecordKind::Guide => { let $cat = &$wiki.guides; $body }
        }
    };
}

macro_rules! with_catalog_mut {
    ($wiki:expr, $kind:expr, |$cat:ident| $body:expr) => {
        match $kind {
            RecordKind::Fish => { let $cat = &mut $wiki.fish; $body }
            RecordKind::Item => { let $cat = &mut $wiki.items; $body }
            RecordKind::MainSkill => { let $cat = &mut $wiki.main_skills; $body }
            RecordKind::SubSkill => { let $cat = &mut $wiki.sub_skills; $body }
            RecordKind::SpecialMainSkill => { let $cat = &mut $wiki.special_skills; $body }
            RecordKind::Map => { let $cat = &mut $wiki.maps; $body }
            RecordKind::Job => { let $cat = &mut $wiki.jobs; $body }
            RecordKind::Guide => { let $cat = &mut $wiki.guides; $body }
        }
    };
}

/// Every catalog the editor works on, plus the dev-mode switch that gates
/// mutations.
pub struct Wiki {
    pub fish: Catalog<Fish>,
    pub items: Catalog<Item>,
    pub main_skills: Catalog<Skill>,
    pub sub_skills: Catalog<Skill>,
    pub special_skills: Catalog<Skill>,
    pub maps: Catalog<AdventureMap>,
    pub jobs: Catalog<DispatchJob>,
    pub guides: Catalog<SystemGuide>,
    dev_mode: bool,
}

async fn load_or_seed<T: Record>(db: &Database, kind: RecordKind, seed: &[T], hook: &Option<ChangeHook>) -> Result<Catalog<T>> {
    let catalog = match db.load_catalog::<T>(kind).await? {
        Some(stored) => {
            info!("Loaded {} {} records", stored.len(), kind);
            stored
        }
        None => {
            info!("No stored {} catalog, using {} seed records", kind, seed.len());
            Catalog::new(kind, seed.to_vec())
        }
    };
    Ok(match hook {
        Some(hook) => catalog.with_hook(hook.clone()),
        None => catalog,
    })
}

fn view_of<T: Record + Card>(catalog: &Catalog<T>, category: &str, query: &str) -> Vec<CardView> {
    let filter = CategoryFilter::<T::Category>::from_str(category).unwrap_or(CategoryFilter::All);
    filter_records(catalog.list(), &filter, query).into_iter().map(Card::card).collect()
}

fn category_labels_of<T: Record>(catalog: &Catalog<T>) -> Vec<String> {
    let mut labels = vec![CategoryFilter::<T::Category>::All.to_string()];
    labels.extend(T::category_options(catalog.list()).iter().map(|c| c.to_string()));
    labels
}

fn save_into<T: Record>(catalog: &mut Catalog<T>, draft: Draft) -> Result<SaveOutcome, EditorError> {
    let original_id = draft.original_id().map(str::to_string);
    let record: T = draft.finish(|id| catalog.contains(id))?;
    Ok(catalog.save(original_id.as_deref(), record)?)
}

fn import_into<T: Record>(catalog: &mut Catalog<T>, blob: &str) -> Result<usize, EditorError> {
    let incoming = Catalog::<T>::from_blob(catalog.kind(), blob)?;
    let count = incoming.len();
    catalog.replace_all(incoming.list().to_vec())?;
    Ok(count)
}

impl Wiki {
    /// In-memory wiki populated with the bundled seed data.
    pub fn seeded() -> Self {
        Self {
            fish: Catalog::new(RecordKind::Fish, seed::SEED_FISH.clone()),
            items: Catalog::new(RecordKind::Item, seed::SEED_ITEMS.clone()),
            main_skills: Catalog::new(RecordKind::MainSkill, seed::SEED_MAIN_SKILLS.clone()),
            sub_skills: Catalog::new(RecordKind::SubSkill, seed::SEED_SUB_SKILLS.clone()),
            special_skills: Catalog::new(RecordKind::SpecialMainSkill, seed::SEED_SPECIAL_SKILLS.clone()),
            maps: Catalog::new(RecordKind::Map, seed::SEED_MAPS.clone()),
            jobs: Catalog::new(RecordKind::Job, seed::SEED_JOBS.clone()),
            guides: Catalog::new(RecordKind::Guide, seed::SEED_GUIDES.clone()),
            dev_mode: false,
        }
    }

    /// Loads every catalog from the local store, seeding the ones that were
    /// never saved. Mutations afterwards are reported to `hook`.
    pub async fn load(db: &Database, hook: Option<ChangeHook>) -> Result<Self> {
        Ok(Self {
            fish: load_or_seed(db, RecordKind::Fish, &seed::SEED_FISH, &hook).await?,
            items: load_or_seed(db, RecordKind::Item, &seed::SEED_ITEMS, &hook).await?,
            main_skills: load_or_seed(db, RecordKind::MainSkill, &seed::SEED_MAIN_SKILLS, &hook).await?,
            sub_skills: load_or_seed(db, RecordKind::SubSkill, &seed::SEED_SUB_SKILLS, &hook).await?,
            special_skills: load_or_seed(db, RecordKind::SpecialMainSkill, &seed::SEED_SPECIAL_SKILLS, &hook).await?,
            maps: load_or_seed(db, RecordKind::Map, &seed::SEED_MAPS, &hook).await?,
            jobs: load_or_seed(db, RecordKind::Job, &seed::SEED_JOBS, &hook).await?,
            guides: load_or_seed(db, RecordKind::Guide, &seed::SEED_GUIDES, &hook).await?,
            dev_mode: false,
        })
    }

    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    pub fn set_dev_mode(&mut self, enabled: bool) {
        info!("Dev mode {}", if enabled { "on" } else { "off" });
        self.dev_mode = enabled;
    }

    pub fn item_name(&self, id: &str) -> Option<&str> {
        self.items.get(id).map(|item| item.name.as_str())
    }

    /// Display text for a reference. Unknown ids show the raw id.
    pub fn item_label(&self, item_ref: &ItemRef) -> String {
        display_ref(item_ref, self.item_name(&item_ref.id))
    }

    /// Names of items whose recipe uses `id`.
    pub fn items_using(&self, id: &str) -> Vec<String> {
        self.items
            .list()
            .iter()
            .filter(|item| item.recipe.iter().flatten().any(|entry| entry.ingredient_id == id))
            .map(|item| item.name.clone())
            .collect()
    }

    pub fn len(&self, kind: RecordKind) -> usize {
        with_catalog!(self, kind, |catalog| catalog.len())
    }

    pub fn kind_counts(&self) -> Vec<(RecordKind, usize)> {
        RecordKind::ALL.iter().map(|&kind| (kind, self.len(kind))).collect()
    }

    pub fn contains(&self, kind: RecordKind, id: &str) -> bool {
        with_catalog!(self, kind, |catalog| catalog.contains(id))
    }

    /// Cards for `kind` matching the category label and query, naturally
    /// sorted by id. An unknown category label shows everything.
    pub fn view(&self, kind: RecordKind, category: &str, query: &str) -> Vec<CardView> {
        with_catalog!(self, kind, |catalog| view_of(catalog, category, query))
    }

    /// Filter labels for `kind`, starting with the catch-all.
    pub fn category_labels(&self, kind: RecordKind) -> Vec<String> {
        with_catalog!(self, kind, |catalog| category_labels_of(catalog))
    }

    pub fn detail(&self, kind: RecordKind, id: &str) -> Option<Vec<DetailLine>> {
        with_catalog!(self, kind, |catalog| catalog.get(id).map(|record| record.detail(self)))
    }

    pub fn new_draft(&self, kind: RecordKind) -> Result<Draft, EditorError> {
        match kind {
            RecordKind::Fish => Draft::create::<Fish>(),
            RecordKind::Item => Draft::create::<Item>(),
            RecordKind::MainSkill | RecordKind::SubSkill | RecordKind::SpecialMainSkill => Draft::create::<Skill>(),
            RecordKind::Map => Draft::create::<AdventureMap>(),
            RecordKind::Job => Draft::create::<DispatchJob>(),
            RecordKind::Guide => Draft::create::<SystemGuide>(),
        }
    }

    pub fn edit_draft(&self, kind: RecordKind, id: &str) -> Result<Option<Draft>, EditorError> {
        with_catalog!(self, kind, |catalog| catalog.get(id).map(Draft::edit).transpose())
    }

    /// Validates the draft and writes it into the catalog for `kind`.
    pub fn save_draft(&mut self, kind: RecordKind, draft: Draft) -> Result<SaveOutcome, EditorError> {
        if !self.dev_mode {
            return Err(EditorError::DevModeOff);
        }
        let outcome = with_catalog_mut!(self, kind, |catalog| save_into(catalog, draft))?;
        info!("{} {:?}", kind, outcome);
        Ok(outcome)
    }

    pub fn delete_record(&mut self, kind: RecordKind, id: &str) -> Result<usize, EditorError> {
        if !self.dev_mode {
            return Err(EditorError::DevModeOff);
        }
        let removed = with_catalog_mut!(self, kind, |catalog| catalog.delete(id))?;
        if removed == 0 {
            warn!("{}: nothing to delete for {}", kind, id);
        }
        Ok(removed)
    }

    /// Serialized catalog, the same blob the local store holds.
    pub fn export(&self, kind: RecordKind) -> Result<String, EditorError> {
        Ok(with_catalog!(self, kind, |catalog| catalog.to_blob())?)
    }

    /// Replaces a whole catalog from an exported blob. Item references are
    /// normalized on the way in.
    pub fn import(&mut self, kind: RecordKind, blob: &str) -> Result<usize, EditorError> {
        if !self.dev_mode {
            return Err(EditorError::DevModeOff);
        }
        with_catalog_mut!(self, kind, |catalog| import_into(catalog, blob))
    }
}
