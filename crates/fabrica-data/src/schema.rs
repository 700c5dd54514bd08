//! Serde data file structs for catalog content.
//!
//! These structs define the on-disk format for items, recipes, and talents.
//! They are deserialized from RON, JSON, or TOML data files and then resolved
//! into catalog types by the loader.

use fabrica_core::catalog::{ItemCategory, TalentKind};
use serde::Deserialize;

// ===========================================================================
// Items
// ===========================================================================

/// An item definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
    pub category: ItemCategory,
    #[serde(default = "default_tier")]
    pub tier: u8,
    /// Volume of one unit, in litres.
    #[serde(default = "default_volume")]
    pub volume: f64,
    /// Units one physical transfer unit moves per batch.
    pub transfer_batch_size: f64,
    /// Seconds per transfer batch.
    pub transfer_time: f64,
}

fn default_tier() -> u8 {
    1
}

fn default_volume() -> f64 {
    1.0
}

// ===========================================================================
// Recipes
// ===========================================================================

/// A recipe ingredient entry, supporting both short tuple form and full form
/// with explicit fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IngredientData {
    /// Short form: `("item_name", quantity)`.
    Short(String, f64),
    /// Full form with explicit fields.
    Full { item: String, quantity: f64 },
}

impl IngredientData {
    pub fn item(&self) -> &str {
        match self {
            IngredientData::Short(name, _) => name,
            IngredientData::Full { item, .. } => item,
        }
    }

    pub fn quantity(&self) -> f64 {
        match self {
            IngredientData::Short(_, qty) => *qty,
            IngredientData::Full { quantity, .. } => *quantity,
        }
    }
}

/// A recipe definition in a data file. Keyed by product name; at most one
/// recipe per product.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeData {
    pub product: String,
    pub quantity: f64,
    /// Processing time in seconds.
    pub time: f64,
    /// Industry kind that runs this recipe (display metadata).
    pub industry: String,
    #[serde(default)]
    pub ingredients: Vec<IngredientData>,
    #[serde(default)]
    pub byproducts: Vec<(String, f64)>,
}

// ===========================================================================
// Talents
// ===========================================================================

/// Which recipes a talent applies to, with item references by name.
#[derive(Debug, Clone, Deserialize)]
pub enum TalentScopeData {
    AllItems,
    Item(String),
    Category(ItemCategory),
    Tier(u8),
}

/// A talent definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct TalentData {
    pub name: String,
    pub kind: TalentKind,
    /// Percent per level, e.g. 5.0 means 5% per level.
    pub per_level: f64,
    #[serde(default = "default_scope")]
    pub scope: TalentScopeData,
}

fn default_scope() -> TalentScopeData {
    TalentScopeData::AllItems
}

// ===========================================================================
// TOML wrappers (TOML does not support top-level arrays)
// ===========================================================================

/// Wrapper for a list of items in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlItems {
    pub items: Vec<ItemData>,
}

/// Wrapper for a list of recipes in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlRecipes {
    pub recipes: Vec<RecipeData>,
}

/// Wrapper for a list of talents in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlTalents {
    pub talents: Vec<TalentData>,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // RON deserialization
    // -----------------------------------------------------------------------

    #[test]
    fn item_data_from_ron() {
        let ron = r#"
            (
                name: "bauxite",
                category: ore,
                transfer_batch_size: 100.0,
                transfer_time: 20.0,
            )
        "#;
        let item: ItemData = ron::from_str(ron).unwrap();
        assert_eq!(item.name, "bauxite");
        assert_eq!(item.category, ItemCategory::Ore);
        assert_eq!(item.tier, 1);
        assert!((item.volume - 1.0).abs() < f64::EPSILON);
        assert!((item.transfer_batch_size - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn item_data_explicit_fields_from_ron() {
        let ron = r#"
            (
                name: "hydrogen",
                category: gas,
                tier: 3,
                volume: 0.5,
                transfer_batch_size: 200.0,
                transfer_time: 10.0,
            )
        "#;
        let item: ItemData = ron::from_str(ron).unwrap();
        assert_eq!(item.category, ItemCategory::Gas);
        assert_eq!(item.tier, 3);
        assert!((item.volume - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn recipe_data_from_ron() {
        let ron = r#"
            (
                product: "plate",
                quantity: 100.0,
                time: 20.0,
                industry: "smelter",
                ingredients: [("aluminium", 100.0)],
                byproducts: [("slag", 10.0)],
            )
        "#;
        let recipe: RecipeData = ron::from_str(ron).unwrap();
        assert_eq!(recipe.product, "plate");
        assert_eq!(recipe.industry, "smelter");
        assert_eq!(recipe.ingredients.len(), 1);
        match &recipe.ingredients[0] {
            IngredientData::Short(name, qty) => {
                assert_eq!(name, "aluminium");
                assert!((qty - 100.0).abs() < f64::EPSILON);
            }
            other => panic!("expected Short variant, got {other:?}"),
        }
        assert_eq!(recipe.byproducts[0].0, "slag");
    }

    #[test]
    fn recipe_ingredient_full_form_from_ron() {
        let ron = r#"
            (
                product: "wire",
                quantity: 100.0,
                time: 20.0,
                industry: "extruder",
                ingredients: [(item: "aluminium", quantity: 50.0)],
            )
        "#;
        let recipe: RecipeData = ron::from_str(ron).unwrap();
        assert_eq!(recipe.ingredients[0].item(), "aluminium");
        assert!((recipe.ingredients[0].quantity() - 50.0).abs() < f64::EPSILON);
        assert!(recipe.byproducts.is_empty());
    }

    #[test]
    fn talent_data_from_ron() {
        let ron = r#"
            (
                name: "production_time",
                kind: time_reduction,
                per_level: 5.0,
                scope: Category(product),
            )
        "#;
        let talent: TalentData = ron::from_str(ron).unwrap();
        assert_eq!(talent.name, "production_time");
        assert_eq!(talent.kind, TalentKind::TimeReduction);
        assert!(matches!(
            talent.scope,
            TalentScopeData::Category(ItemCategory::Product)
        ));
    }

    #[test]
    fn talent_data_default_scope_from_ron() {
        let ron = r#"(name: "haste", kind: time_reduction, per_level: 2.0)"#;
        let talent: TalentData = ron::from_str(ron).unwrap();
        assert!(matches!(talent.scope, TalentScopeData::AllItems));
    }

    // -----------------------------------------------------------------------
    // JSON deserialization
    // -----------------------------------------------------------------------

    #[test]
    fn item_data_from_json() {
        let json = r#"{
            "name": "bauxite",
            "category": "ore",
            "transfer_batch_size": 100.0,
            "transfer_time": 20.0
        }"#;
        let item: ItemData = serde_json::from_str(json).unwrap();
        assert_eq!(item.name, "bauxite");
        assert_eq!(item.category, ItemCategory::Ore);
    }

    #[test]
    fn recipe_data_from_json() {
        let json = r#"{
            "product": "plate",
            "quantity": 100.0,
            "time": 20.0,
            "industry": "smelter",
            "ingredients": [["aluminium", 100.0]]
        }"#;
        let recipe: RecipeData = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.product, "plate");
        assert_eq!(recipe.ingredients[0].item(), "aluminium");
    }

    #[test]
    fn talent_data_from_json() {
        let json = r#"{
            "name": "input_efficiency",
            "kind": "input_reduction",
            "per_level": 2.0,
            "scope": {"Item": "plate"}
        }"#;
        let talent: TalentData = serde_json::from_str(json).unwrap();
        assert!(matches!(talent.scope, TalentScopeData::Item(ref i) if i == "plate"));
    }

    // -----------------------------------------------------------------------
    // TOML deserialization (requires wrapper structs)
    // -----------------------------------------------------------------------

    #[test]
    fn items_from_toml() {
        let toml_str = r#"
            [[items]]
            name = "bauxite"
            category = "ore"
            transfer_batch_size = 100.0
            transfer_time = 20.0

            [[items]]
            name = "quartz"
            category = "ore"
            transfer_batch_size = 100.0
            transfer_time = 20.0
        "#;
        let wrapper: TomlItems = toml::from_str(toml_str).unwrap();
        assert_eq!(wrapper.items.len(), 2);
        assert_eq!(wrapper.items[1].name, "quartz");
    }

    #[test]
    fn recipes_from_toml() {
        let toml_str = r#"
            [[recipes]]
            product = "plate"
            quantity = 100.0
            time = 20.0
            industry = "smelter"
            ingredients = [["aluminium", 100.0]]
        "#;
        let wrapper: TomlRecipes = toml::from_str(toml_str).unwrap();
        assert_eq!(wrapper.recipes.len(), 1);
        assert_eq!(wrapper.recipes[0].product, "plate");
    }

    #[test]
    fn talents_from_toml() {
        let toml_str = r#"
            [[talents]]
            name = "production_time"
            kind = "time_reduction"
            per_level = 5.0

            [talents.scope]
            Tier = 2
        "#;
        let wrapper: TomlTalents = toml::from_str(toml_str).unwrap();
        assert_eq!(wrapper.talents.len(), 1);
        assert!(matches!(wrapper.talents[0].scope, TalentScopeData::Tier(2)));
    }
}
