//! Compact card and expanded detail views of a record.

use crate::engine::normalize::ItemRef;
use crate::engine::records::{AdventureMap, DispatchJob, Fish, Item, Skill, SystemGuide, LEVEL_SLOTS};
use crate::engine::wiki::Wiki;

#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub id: String,
    pub title: String,
    pub badge: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailLine {
    pub label: String,
    pub value: String,
}

impl DetailLine {
    fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { label: label.into(), value: value.into() }
    }
}

pub trait Card {
    fn card(&self) -> CardView;
    fn detail(&self, wiki: &Wiki) -> Vec<DetailLine>;
}

/// Placeholder shown for empty text.
const NONE: &str = "-";

fn or_none(text: &str) -> String {
    if text.trim().is_empty() { NONE.to_string() } else { text.to_string() }
}

fn joined(values: &[String]) -> String {
    if values.is_empty() { NONE.to_string() } else { values.join(", ") }
}

fn ref_list(wiki: &Wiki, refs: &[ItemRef]) -> String {
    if refs.is_empty() {
        return NONE.to_string();
    }
    refs.iter().map(|r| wiki.item_label(r)).collect::<Vec<_>>().join(", ")
}

fn image_line(label: &str, reference: Option<&str>) -> DetailLine {
    let value = match reference {
        None => NONE.to_string(),
        Some(r) if r.is_empty() => NONE.to_string(),
        Some(r) if r.starts_with("data:") => format!("embedded ({} bytes)", r.len()),
        Some(r) => r.to_string(),
    };
    DetailLine::new(label, value)
}

fn level_lines(prefix: &str, levels: &[String; LEVEL_SLOTS]) -> Vec<DetailLine> {
    levels
        .iter()
        .enumerate()
        .filter(|(_, effect)| !effect.is_empty())
        .map(|(i, effect)| DetailLine::new(format!("{}Lv.{}", prefix, i + 1), effect.clone()))
        .collect()
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or("").to_string()
}

impl Card for Fish {
    fn card(&self) -> CardView {
        CardView {
            id: self.id.clone(),
            title: self.name.clone(),
            badge: "★".repeat(self.rarity.stars()),
            summary: self.depth.clone(),
        }
    }

    fn detail(&self, _wiki: &Wiki) -> Vec<DetailLine> {
        vec![
            DetailLine::new("ID", self.id.clone()),
            DetailLine::new("Rarity", self.rarity.to_string()),
            DetailLine::new("Depth", or_none(&self.depth)),
            DetailLine::new("Conditions", joined(&self.conditions)),
            DetailLine::new("Battle", self.battle_requirement.clone().unwrap_or_else(|| NONE.to_string())),
            DetailLine::new("Tags", joined(&self.tags)),
            image_line("Normal ♂", self.images.normal_male.as_deref()),
            image_line("Normal ♀", self.images.normal_female.as_deref()),
            image_line("Shiny ♂", self.images.shiny_male.as_deref()),
            image_line("Shiny ♀", self.images.shiny_female.as_deref()),
            DetailLine::new("Description", or_none(&self.description)),
        ]
    }
}

impl Card for Item {
    fn card(&self) -> CardView {
        CardView {
            id: self.id.clone(),
            title: self.name.clone(),
            badge: self.item_type.to_string(),
            summary: self.category.clone(),
        }
    }

    fn detail(&self, wiki: &Wiki) -> Vec<DetailLine> {
        let mut lines = vec![
            DetailLine::new("ID", self.id.clone()),
            DetailLine::new("Type", format!("{} / {}", self.item_type, or_none(&self.category))),
            image_line("Image", Some(&self.image)),
        ];
        if let Some(recipe) = &self.recipe {
            let text = recipe
                .iter()
                .map(|entry| format!("{} x{}", wiki.item_name(&entry.ingredient_id).unwrap_or(&entry.ingredient_id), entry.quantity))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(DetailLine::new("Recipe", or_none(&text)));
        }
        if let Some(stats) = &self.tackle {
            for (stat, value) in stats {
                lines.push(DetailLine::new(stat.clone(), value.to_string()));
            }
        }
        if let Some(flavors) = &self.lunchbox {
            let text = flavors.iter().map(|(f, n)| format!("{} {}", f, n)).collect::<Vec<_>>().join(", ");
            lines.push(DetailLine::new("Flavors", or_none(&text)));
        }
        if let Some(bundle) = &self.bundle {
            lines.push(DetailLine::new("Contents", ref_list(wiki, &bundle.contents)));
            lines.push(DetailLine::new("Substitutes", ref_list(wiki, &bundle.substitutes)));
        }
        let used_in = wiki.items_using(&self.id);
        if !used_in.is_empty() {
            lines.push(DetailLine::new("Used in", used_in.join(", ")));
        }
        lines.push(DetailLine::new("Description", or_none(&self.description)));
        lines
    }
}

impl Card for Skill {
    fn card(&self) -> CardView {
        CardView {
            id: self.id.clone(),
            title: self.name.clone(),
            badge: self.skill_type.to_string(),
            summary: first_line(&self.description),
        }
    }

    fn detail(&self, _wiki: &Wiki) -> Vec<DetailLine> {
        let mut lines = vec![
            DetailLine::new("ID", self.id.clone()),
            DetailLine::new("Type", self.skill_type.to_string()),
            DetailLine::new("Description", or_none(&self.description)),
        ];
        lines.extend(level_lines("", &self.levels));
        for variant in &self.variants {
            lines.push(DetailLine::new(format!("[{}]", variant.category), or_none(&variant.description)));
            lines.extend(level_lines(&format!("[{}] ", variant.category), &variant.levels));
        }
        lines.push(DetailLine::new("Partners", joined(&self.partners)));
        lines
    }
}

impl Card for AdventureMap {
    fn card(&self) -> CardView {
        CardView {
            id: self.id.clone(),
            title: self.name.clone(),
            badge: format!("#{}", self.order),
            summary: self.field_effects.iter().map(|e| e.name.clone()).collect::<Vec<_>>().join(", "),
        }
    }

    fn detail(&self, wiki: &Wiki) -> Vec<DetailLine> {
        let effects = self
            .field_effects
            .iter()
            .map(|e| format!("{} {:+}%", e.name, e.percentage))
            .collect::<Vec<_>>();
        vec![
            DetailLine::new("ID", self.id.clone()),
            DetailLine::new("Order", self.order.to_string()),
            image_line("Banner", Some(&self.image)),
            DetailLine::new("Effects", joined(&effects)),
            DetailLine::new("Drops", ref_list(wiki, &self.drops)),
            DetailLine::new("Rewards", ref_list(wiki, &self.rewards)),
            DetailLine::new("Buddies", joined(&self.buddies)),
        ]
    }
}

impl Card for DispatchJob {
    fn card(&self) -> CardView {
        CardView {
            id: self.id.clone(),
            title: self.name.clone(),
            badge: format!("{} req", self.requests.len()),
            summary: self.requests.iter().map(|r| r.name.clone()).collect::<Vec<_>>().join(", "),
        }
    }

    fn detail(&self, wiki: &Wiki) -> Vec<DetailLine> {
        let mut lines = vec![DetailLine::new("ID", self.id.clone()), image_line("Banner", Some(&self.image))];
        for request in &self.requests {
            lines.push(DetailLine::new(or_none(&request.name), format!("tags: {}", joined(&request.tags))));
            lines.push(DetailLine::new("  Normal", ref_list(wiki, &request.rewards.normal)));
            lines.push(DetailLine::new("  Great", ref_list(wiki, &request.rewards.great)));
            lines.push(DetailLine::new("  Super", ref_list(wiki, &request.rewards.super_)));
        }
        lines
    }
}

impl Card for SystemGuide {
    fn card(&self) -> CardView {
        CardView {
            id: self.id.clone(),
            title: self.title.clone(),
            badge: self.category.clone(),
            summary: first_line(&self.summary),
        }
    }

    fn detail(&self, _wiki: &Wiki) -> Vec<DetailLine> {
        vec![
            DetailLine::new("ID", self.id.clone()),
            DetailLine::new("Category", or_none(&self.category)),
            DetailLine::new("Tags", joined(&self.tags)),
            DetailLine::new("Updated", self.updated_at.format("%Y-%m-%d %H:%M").to_string()),
            DetailLine::new("Summary", or_none(&self.summary)),
            DetailLine::new("Content", or_none(&self.content)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::records::{RecordKind, Rarity};

    fn value_of<'a>(lines: &'a [DetailLine], label: &str) -> &'a str {
        lines.iter().find(|l| l.label == label).map(|l| l.value.as_str()).unwrap_or("")
    }

    #[test]
    fn fish_card_shows_rarity_as_stars() {
        let fish = Fish { id: "011".into(), name: "Moonlit Eel".into(), rarity: Rarity::Epic, ..Fish::default() };
        let card = fish.card();
        assert_eq!(card.badge, "★★★★");
        assert_eq!(card.title, "Moonlit Eel");
    }

    #[test]
    fn recipe_names_resolve_with_raw_id_fallback() {
        let wiki = Wiki::seeded();
        let line = wiki.items.get("t-002").unwrap().detail(&wiki);
        assert_eq!(value_of(&line, "Recipe"), "Iron Ore x4, m-404 x1");
    }

    #[test]
    fn map_drops_mark_low_rate_entries() {
        let wiki = Wiki::seeded();
        let lines = wiki.maps.get("map-02").unwrap().detail(&wiki);
        assert_eq!(value_of(&lines, "Drops"), "Fish Scale, Pearl (low)");
        assert_eq!(value_of(&lines, "Effects"), "Strong current -10%, Warm water +15%");
    }

    #[test]
    fn bare_and_structured_refs_render_the_same() {
        let wiki = Wiki::seeded();
        let bare: AdventureMap = serde_json::from_value(serde_json::json!({ "id": "x", "drops": ["m-001"] })).unwrap();
        let full: AdventureMap =
            serde_json::from_value(serde_json::json!({ "id": "x", "drops": [{ "id": "m-001", "isLowRate": false }] })).unwrap();
        assert_eq!(bare.detail(&wiki), full.detail(&wiki));
    }

    #[test]
    fn materials_list_where_they_are_used() {
        let wiki = Wiki::seeded();
        let lines = wiki.items.get("m-002").unwrap().detail(&wiki);
        assert_eq!(value_of(&lines, "Used in"), "Bamboo Rod");
        assert_eq!(wiki.items.kind(), RecordKind::Item);
    }

    #[test]
    fn skill_detail_lists_filled_levels_and_variants() {
        let wiki = Wiki::seeded();
        let lines = wiki.main_skills.get("ms-001").unwrap().detail(&wiki);
        assert_eq!(value_of(&lines, "Lv.6"), "-15% tension");
        assert_eq!(value_of(&lines, "[tournament] Lv.1"), "-1%");
    }
}
