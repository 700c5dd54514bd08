//! The item/recipe/talent catalog: immutable lookup tables the planner
//! consumes as read-only data.
//!
//! Built via [`CatalogBuilder`] (register everything, then `build()`), after
//! which the [`Catalog`] is frozen. Recipes are stored unscaled; the planner
//! asks for [`Catalog::scaled_recipe`] with a set of talent levels, which
//! applies additive percentage modifiers to time, inputs, and outputs before
//! the router ever sees the recipe.

use crate::id::{ItemId, RecipeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Talent levels are capped at 5 in the game data.
pub const MAX_TALENT_LEVEL: u8 = 5;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while building a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate item name: {0}")]
    DuplicateItem(String),
    #[error("duplicate recipe for product: {0}")]
    DuplicateRecipe(String),
    #[error("invalid item reference: {0:?}")]
    InvalidItemRef(ItemId),
    #[error("recipe '{recipe}' has non-positive {field}")]
    NonPositive { recipe: String, field: &'static str },
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Broad item classification. Drives link reservations (catalysts) and
/// routing mode (gases), and distinguishes ores (leaf nodes) from
/// craftable products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Ore,
    Pure,
    Product,
    Part,
    Element,
    Catalyst,
    Gas,
}

/// An item definition: identity plus the physical constants the router
/// needs for transfer math.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    pub name: String,
    pub category: ItemCategory,
    pub tier: u8,
    /// Volume of one unit, in litres.
    pub volume: f64,
    /// How many units one physical transfer unit moves per batch.
    pub transfer_batch_size: f64,
    /// Seconds per transfer batch.
    pub transfer_time: f64,
}

impl ItemDef {
    pub fn is_ore(&self) -> bool {
        self.category == ItemCategory::Ore
    }

    pub fn is_catalyst(&self) -> bool {
        self.category == ItemCategory::Catalyst
    }

    pub fn is_gas(&self) -> bool {
        self.category == ItemCategory::Gas
    }

    /// Steady-state throughput of a single physical transfer unit, in
    /// units per second.
    pub fn transfer_unit_rate(&self) -> f64 {
        self.transfer_batch_size / self.transfer_time
    }
}

// ---------------------------------------------------------------------------
// Recipes
// ---------------------------------------------------------------------------

/// An unscaled recipe definition as registered in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDef {
    pub product: ItemId,
    pub quantity: f64,
    /// Processing time in seconds.
    pub time: f64,
    /// Industry kind that runs this recipe (display metadata).
    pub industry: String,
    /// Ingredient -> quantity per batch. Order-irrelevant; stored sorted
    /// by item id for deterministic iteration.
    pub ingredients: Vec<(ItemId, f64)>,
    /// Byproduct -> quantity per batch.
    pub byproducts: Vec<(ItemId, f64)>,
}

/// A talent-scaled recipe, ready for the router. Quantities and time have
/// the requester's talent modifiers applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub product: ItemId,
    pub quantity: f64,
    pub time: f64,
    pub industry: String,
    pub ingredients: Vec<(ItemId, f64)>,
    pub byproducts: Vec<(ItemId, f64)>,
}

impl Recipe {
    /// Units of product produced per second by one industry.
    pub fn production_rate(&self) -> f64 {
        self.quantity / self.time
    }

    /// Units of `item` consumed per second by one industry, or 0.0 if the
    /// recipe does not use it.
    pub fn consumption_rate(&self, item: ItemId) -> f64 {
        self.ingredients
            .iter()
            .find(|(i, _)| *i == item)
            .map(|(_, q)| q / self.time)
            .unwrap_or(0.0)
    }

    /// Units of `item` emitted per second as a byproduct by one industry.
    pub fn byproduct_rate(&self, item: ItemId) -> f64 {
        self.byproducts
            .iter()
            .find(|(i, _)| *i == item)
            .map(|(_, q)| q / self.time)
            .unwrap_or(0.0)
    }

    pub fn requires(&self, item: ItemId) -> bool {
        self.ingredients.iter().any(|(i, _)| *i == item)
    }
}

// ---------------------------------------------------------------------------
// Talents
// ---------------------------------------------------------------------------

/// What a talent modifies. Each level adds `per_level` percent to the
/// modifier (reductions subtract, increases add).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TalentKind {
    TimeReduction,
    InputReduction,
    OutputIncrease,
}

/// Which recipes a talent applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TalentScope {
    AllItems,
    Item(ItemId),
    Category(ItemCategory),
    Tier(u8),
}

/// A talent definition in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TalentDef {
    pub name: String,
    pub kind: TalentKind,
    /// Percent per level, e.g. 5.0 means 5% per level.
    pub per_level: f64,
    pub scope: TalentScope,
}

/// The talent levels of a user, keyed by talent name. Levels are clamped
/// to [`MAX_TALENT_LEVEL`] on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalentLevels(BTreeMap<String, u8>);

impl TalentLevels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, level: u8) {
        self.0.insert(name.to_string(), level.min(MAX_TALENT_LEVEL));
    }

    pub fn level(&self, name: &str) -> u8 {
        self.0.get(name).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.0.iter().map(|(n, &l)| (n.as_str(), l))
    }

    /// True if every talent level in `other` is at most the level in `self`.
    /// A plan built under `other` is then physically replicable by `self`.
    pub fn dominates(&self, other: &TalentLevels) -> bool {
        other.iter().all(|(name, level)| self.level(name) >= level)
    }
}

impl FromIterator<(String, u8)> for TalentLevels {
    fn from_iter<T: IntoIterator<Item = (String, u8)>>(iter: T) -> Self {
        let mut levels = TalentLevels::new();
        for (name, level) in iter {
            levels.set(&name, level);
        }
        levels
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing an immutable [`Catalog`].
/// Register items, recipes, and talents, then `build()`.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    items: Vec<ItemDef>,
    item_name_to_id: HashMap<String, ItemId>,
    recipes: Vec<RecipeDef>,
    recipe_by_product: HashMap<ItemId, RecipeId>,
    talents: Vec<TalentDef>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item type. Returns its id, or an error on a duplicate name.
    pub fn register_item(&mut self, def: ItemDef) -> Result<ItemId, CatalogError> {
        if self.item_name_to_id.contains_key(&def.name) {
            return Err(CatalogError::DuplicateItem(def.name));
        }
        let id = ItemId(self.items.len() as u32);
        self.item_name_to_id.insert(def.name.clone(), id);
        self.items.push(def);
        Ok(id)
    }

    /// Register a recipe. At most one recipe per product item.
    pub fn register_recipe(&mut self, mut def: RecipeDef) -> Result<RecipeId, CatalogError> {
        if self.recipe_by_product.contains_key(&def.product) {
            let name = self
                .items
                .get(def.product.0 as usize)
                .map(|i| i.name.clone())
                .unwrap_or_else(|| format!("{:?}", def.product));
            return Err(CatalogError::DuplicateRecipe(name));
        }
        def.ingredients.sort_by_key(|(i, _)| *i);
        def.byproducts.sort_by_key(|(i, _)| *i);
        let id = RecipeId(self.recipes.len() as u32);
        self.recipe_by_product.insert(def.product, id);
        self.recipes.push(def);
        Ok(id)
    }

    pub fn register_talent(&mut self, def: TalentDef) {
        self.talents.push(def);
    }

    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.item_name_to_id.get(name).copied()
    }

    /// Finalize. Validates every recipe reference and every quantity.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        for recipe in &self.recipes {
            let product_ref = (recipe.product, recipe.quantity);
            let refs = std::iter::once(&product_ref)
                .chain(recipe.ingredients.iter())
                .chain(recipe.byproducts.iter());
            for (item, _) in refs {
                if item.0 as usize >= self.items.len() {
                    return Err(CatalogError::InvalidItemRef(*item));
                }
            }
            let recipe_name = self.items[recipe.product.0 as usize].name.clone();
            if recipe.time <= 0.0 {
                return Err(CatalogError::NonPositive {
                    recipe: recipe_name,
                    field: "time",
                });
            }
            if recipe.quantity <= 0.0 {
                return Err(CatalogError::NonPositive {
                    recipe: recipe_name,
                    field: "quantity",
                });
            }
        }
        Ok(Catalog {
            items: self.items,
            item_name_to_id: self.item_name_to_id,
            recipes: self.recipes,
            recipe_by_product: self.recipe_by_product,
            talents: self.talents,
        })
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Immutable catalog. Frozen after build(). Thread-safe to share.
#[derive(Debug)]
pub struct Catalog {
    items: Vec<ItemDef>,
    item_name_to_id: HashMap<String, ItemId>,
    recipes: Vec<RecipeDef>,
    recipe_by_product: HashMap<ItemId, RecipeId>,
    talents: Vec<TalentDef>,
}

impl Catalog {
    pub fn item(&self, id: ItemId) -> Option<&ItemDef> {
        self.items.get(id.0 as usize)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn recipe_def(&self, id: RecipeId) -> Option<&RecipeDef> {
        self.recipes.get(id.0 as usize)
    }

    /// The recipe producing `item`, if it is craftable.
    pub fn recipe_for(&self, item: ItemId) -> Option<&RecipeDef> {
        self.recipe_by_product
            .get(&item)
            .and_then(|id| self.recipe_def(*id))
    }

    pub fn talent(&self, name: &str) -> Option<&TalentDef> {
        self.talents.iter().find(|t| t.name == name)
    }

    pub fn talents(&self) -> &[TalentDef] {
        &self.talents
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    /// True if the item has no recipe (terminal of ingredient resolution).
    pub fn is_ore(&self, item: ItemId) -> bool {
        !self.recipe_by_product.contains_key(&item)
    }

    fn talent_applies(&self, talent: &TalentDef, item: ItemId) -> bool {
        match talent.scope {
            TalentScope::AllItems => true,
            TalentScope::Item(i) => i == item,
            TalentScope::Category(c) => self.item(item).map(|d| d.category == c).unwrap_or(false),
            TalentScope::Tier(t) => self.item(item).map(|d| d.tier == t).unwrap_or(false),
        }
    }

    /// The recipe for `item` with `talents` applied: additive percentage
    /// modifiers on time, ingredient quantities, and output quantities.
    /// Returns `None` for ores.
    pub fn scaled_recipe(&self, item: ItemId, talents: &TalentLevels) -> Option<Recipe> {
        let def = self.recipe_for(item)?;

        let mut time_factor = 1.0;
        let mut input_factor = 1.0;
        let mut output_factor = 1.0;
        for talent in &self.talents {
            let level = talents.level(&talent.name);
            if level == 0 || !self.talent_applies(talent, item) {
                continue;
            }
            let delta = talent.per_level * level as f64 / 100.0;
            match talent.kind {
                TalentKind::TimeReduction => time_factor -= delta,
                TalentKind::InputReduction => input_factor -= delta,
                TalentKind::OutputIncrease => output_factor += delta,
            }
        }
        // Reductions never drive a recipe to zero or negative.
        let time_factor = time_factor.max(0.01);
        let input_factor = input_factor.max(0.0);

        Some(Recipe {
            product: def.product,
            quantity: def.quantity * output_factor,
            time: def.time * time_factor,
            industry: def.industry.clone(),
            ingredients: def
                .ingredients
                .iter()
                .map(|(i, q)| (*i, q * input_factor))
                .collect(),
            byproducts: def
                .byproducts
                .iter()
                .map(|(i, q)| (*i, q * output_factor))
                .collect(),
        })
    }
}
