use chrono::{TimeZone, Utc};
use lazy_static::lazy_static;
use std::collections::BTreeMap;

use crate::engine::normalize::ItemRef;
use crate::engine::records::{
    AdventureMap, BundleContents, DispatchJob, DispatchRequest, FieldEffect, Fish, FishImages, Item, ItemType,
    LevelEffects, Rarity, RecipeEntry, RewardTiers, Skill, SkillType, SkillVariant, SystemGuide,
};

// --- Helpers ---

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn levels(values: [&str; 6]) -> LevelEffects {
    values.map(str::to_string)
}

fn refs(values: &[&str]) -> Vec<ItemRef> {
    // Trailing '*' marks a low-rate drop
    values
        .iter()
        .map(|v| match v.strip_suffix('*') {
            Some(id) => ItemRef::low_rate(id),
            None => ItemRef::new(*v),
        })
        .collect()
}

fn fish(id: &str, name: &str, rarity: Rarity, depth: &str, conditions: &[&str], tags: &[&str], description: &str) -> Fish {
    Fish {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        rarity,
        depth: depth.to_string(),
        conditions: strings(conditions),
        battle_requirement: None,
        tags: strings(tags),
        images: FishImages::default(),
    }
}

fn material(id: &str, name: &str, category: &str, description: &str) -> Item {
    Item {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        item_type: ItemType::Material,
        category: category.to_string(),
        ..Item::default()
    }
}

fn recipe(entries: &[(&str, u32)]) -> Option<Vec<RecipeEntry>> {
    Some(entries.iter().map(|(id, quantity)| RecipeEntry { ingredient_id: id.to_string(), quantity: *quantity }).collect())
}

// --- Data ---

lazy_static! {
    pub static ref SEED_FISH: Vec<Fish> = vec![
        fish("001", "Creek Minnow", Rarity::Common, "Shallows 0-5m", &["any weather"], &["freshwater", "starter"],
            "A tiny silver fish found in every creek."),
        fish("002", "River Carp", Rarity::Common, "River bed 2-8m", &["daytime"], &["freshwater"],
            "Slow and heavy; a patient angler's first trophy."),
        fish("003", "Mudskipper", Rarity::Uncommon, "Mudflats 0-1m", &["low tide"], &["brackish"],
            "Spends as much time on land as in water."),
        fish("010", "Coral Snapper", Rarity::Rare, "Reef 10-25m", &["sunny"], &["saltwater", "reef"],
            "Bright red scales that glow under reef light."),
        fish("011", "Moonlit Eel", Rarity::Epic, "Trench 40-80m", &["night", "full moon"], &["saltwater", "night"],
            "Only surfaces when the moon is full."),
        {
            let mut king = fish("100", "Abyssal King", Rarity::Legendary, "Abyss 200m+", &["storm"], &["saltwater", "boss"],
                "Ruler of the deep trench. Few have seen it and fewer have landed it.");
            king.battle_requirement = Some("Rod power 80 and a Reinforced Line".to_string());
            king
        },
    ];

    pub static ref SEED_ITEMS: Vec<Item> = vec![
        material("m-001", "Fish Scale", "fish", "Common crafting material dropped by most fish."),
        material("m-002", "Driftwood", "plant", "Smoothed by years in the current."),
        material("m-003", "Iron Ore", "ore", "Raw ore from the quarry dispatch."),
        material("m-004", "Pearl", "misc", "A rare find inside reef shellfish."),
        Item {
            id: "t-001".to_string(),
            name: "Bamboo Rod".to_string(),
            description: "A light rod for beginners.".to_string(),
            item_type: ItemType::Tackle,
            category: "rod".to_string(),
            recipe: recipe(&[("m-002", 3), ("m-001", 2)]),
            tackle: Some(BTreeMap::from([("power".to_string(), 10.0), ("control".to_string(), 15.0)])),
            ..Item::default()
        },
        Item {
            id: "t-002".to_string(),
            name: "Reinforced Line".to_string(),
            description: "Holds against the strongest pulls.".to_string(),
            item_type: ItemType::Tackle,
            category: "line".to_string(),
            recipe: recipe(&[("m-003", 4), ("m-404", 1)]),
            tackle: Some(BTreeMap::from([("power".to_string(), 25.0), ("luck".to_string(), 1.5)])),
            ..Item::default()
        },
        Item {
            id: "l-001".to_string(),
            name: "Rice Ball".to_string(),
            description: "Simple and filling.".to_string(),
            item_type: ItemType::Lunchbox,
            category: "staple".to_string(),
            lunchbox: Some(BTreeMap::from([("salty".to_string(), 2), ("savory".to_string(), 1)])),
            ..Item::default()
        },
        Item {
            id: "l-002".to_string(),
            name: "Sweet Omelette".to_string(),
            description: "A lunchbox favourite.".to_string(),
            item_type: ItemType::Lunchbox,
            category: "side".to_string(),
            lunchbox: Some(BTreeMap::from([("sweet".to_string(), 3)])),
            ..Item::default()
        },
        Item {
            id: "b-001".to_string(),
            name: "Any Lunchbox Staple".to_string(),
            description: "Any of these can be used in a recipe asking for a staple.".to_string(),
            item_type: ItemType::Bundle,
            category: "bundle".to_string(),
            bundle: Some(BundleContents { contents: refs(&["l-001"]), substitutes: refs(&["l-002"]) }),
            ..Item::default()
        },
    ];

    pub static ref SEED_MAIN_SKILLS: Vec<Skill> = vec![
        Skill {
            id: "ms-001".to_string(),
            name: "Steady Hands".to_string(),
            description: "Reduces line tension while reeling.".to_string(),
            skill_type: SkillType::Passive,
            levels: levels(["-3% tension", "-5% tension", "-7% tension", "-9% tension", "-12% tension", "-15% tension"]),
            variants: vec![SkillVariant {
                category: "tournament".to_string(),
                description: "Halved effect during tournaments.".to_string(),
                levels: levels(["-1%", "-2%", "-3%", "-4%", "-6%", "-7%"]),
            }],
            partners: strings(&["partner-hana"]),
            ..Skill::default()
        },
        Skill {
            id: "ms-002".to_string(),
            name: "Lucky Strike".to_string(),
            description: "Chance to land a second fish.".to_string(),
            skill_type: SkillType::Probabilistic,
            levels: levels(["2%", "3%", "4%", "5%", "6%", "8%"]),
            partners: strings(&["partner-rio", "partner-hana"]),
            ..Skill::default()
        },
    ];

    pub static ref SEED_SUB_SKILLS: Vec<Skill> = vec![
        Skill {
            id: "ss-001".to_string(),
            name: "Early Riser".to_string(),
            description: "Bonus bite rate in the morning.".to_string(),
            skill_type: SkillType::Passive,
            levels: levels(["+2%", "+4%", "+6%", "+8%", "+10%", "+12%"]),
            ..Skill::default()
        },
    ];

    pub static ref SEED_SPECIAL_SKILLS: Vec<Skill> = vec![
        Skill {
            id: "sp-001".to_string(),
            name: "Tidal Surge".to_string(),
            description: "Calls a wave that stuns nearby fish.".to_string(),
            skill_type: SkillType::Probabilistic,
            levels: levels(["5%", "6%", "7%", "8%", "9%", "10%"]),
            partners: strings(&["partner-nami"]),
            ..Skill::default()
        },
    ];

    pub static ref SEED_MAPS: Vec<AdventureMap> = vec![
        AdventureMap {
            id: "map-01".to_string(),
            name: "Willow Creek".to_string(),
            order: 1,
            field_effects: vec![FieldEffect { name: "Calm water".to_string(), percentage: 10.0 }],
            drops: refs(&["m-001", "m-002"]),
            rewards: refs(&["t-001"]),
            buddies: strings(&["buddy-otter"]),
            ..AdventureMap::default()
        },
        AdventureMap {
            id: "map-02".to_string(),
            name: "Coral Reef".to_string(),
            order: 2,
            field_effects: vec![
                FieldEffect { name: "Strong current".to_string(), percentage: -10.0 },
                FieldEffect { name: "Warm water".to_string(), percentage: 15.0 },
            ],
            drops: refs(&["m-001", "m-004*"]),
            rewards: refs(&["t-002*"]),
            buddies: strings(&["buddy-turtle", "buddy-crab"]),
            ..AdventureMap::default()
        },
    ];

    pub static ref SEED_JOBS: Vec<DispatchJob> = vec![
        DispatchJob {
            id: "job-01".to_string(),
            name: "Quarry Haul".to_string(),
            requests: vec![
                DispatchRequest {
                    name: "Short shift".to_string(),
                    tags: strings(&["strength"]),
                    rewards: RewardTiers {
                        normal: refs(&["m-003"]),
                        great: refs(&["m-003", "m-003"]),
                        super_: refs(&["m-003", "m-004*"]),
                    },
                },
                DispatchRequest {
                    name: "Night shift".to_string(),
                    tags: strings(&["strength", "night"]),
                    rewards: RewardTiers {
                        normal: refs(&["m-003"]),
                        great: refs(&["m-003", "m-002"]),
                        super_: refs(&["t-002*"]),
                    },
                },
            ],
            ..DispatchJob::default()
        },
    ];

    pub static ref SEED_GUIDES: Vec<SystemGuide> = vec![
        SystemGuide {
            id: "guide-01".to_string(),
            category: "basics".to_string(),
            title: "Your first catch".to_string(),
            tags: strings(&["starter", "fishing"]),
            summary: "Casting, waiting for a bite, and reeling in.".to_string(),
            content: "Cast near cover, wait for the float to dip twice, then reel while watching line tension.".to_string(),
            updated_at: Utc.timestamp_millis_opt(1_704_067_200_000).single().unwrap_or_else(Utc::now),
        },
        SystemGuide {
            id: "guide-02".to_string(),
            category: "dispatch".to_string(),
            title: "Dispatch rewards".to_string(),
            tags: strings(&["dispatch", "rewards"]),
            summary: "How normal, great and super results are rolled.".to_string(),
            content: "Each request rolls one reward tier. Matching tags raise the chance of great and super results.".to_string(),
            updated_at: Utc.timestamp_millis_opt(1_704_067_200_000).single().unwrap_or_else(Utc::now),
        },
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn seed_ids_are_unique_per_catalog() {
        let fish: HashSet<_> = SEED_FISH.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(fish.len(), SEED_FISH.len());
        let items: HashSet<_> = SEED_ITEMS.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(items.len(), SEED_ITEMS.len());
    }

    #[test]
    fn seed_items_use_categories_of_their_type() {
        for item in SEED_ITEMS.iter() {
            assert!(item.item_type.categories().contains(&item.category.as_str()), "{} has bad category", item.id);
        }
    }

    #[test]
    fn seed_keeps_one_dangling_reference_for_fallback_display() {
        let ids: HashSet<_> = SEED_ITEMS.iter().map(|i| i.id.as_str()).collect();
        let dangling: Vec<_> = SEED_ITEMS
            .iter()
            .flat_map(|i| i.recipe.iter().flatten())
            .filter(|r| !ids.contains(r.ingredient_id.as_str()))
            .collect();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].ingredient_id, "m-404");
    }
}
