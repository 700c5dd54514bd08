//! Resolution pipeline: reads data files, resolves name references, builds
//! the catalog.
//!
//! A data directory holds `items` and `recipes` files (required) and an
//! optional `talents` file, each in RON, JSON, or TOML. [`load_catalog`]
//! discovers the files, deserializes them, and resolves every item name into
//! a [`Catalog`].

use fabrica_core::catalog::{
    Catalog, CatalogBuilder, CatalogError, ItemDef, RecipeDef, TalentDef, TalentScope,
};
use fabrica_core::id::ItemId;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::schema::{ItemData, RecipeData, TalentData, TalentScopeData};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// An item name reference could not be resolved.
    #[error("unresolved item reference '{name}' in {file}")]
    UnresolvedItem { file: PathBuf, name: String },

    /// The resolved definitions were rejected by the catalog.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without
/// extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let extensions = ["ron", "toml", "json"];
    let mut found: Option<PathBuf> = None;

    for ext in &extensions {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(ref existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Deserialize a list from a file. For TOML files, extracts the array at the
/// given `toml_key` from a top-level table. For RON and JSON, deserializes
/// directly as `Vec<T>`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let parse_err = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Format::Toml => {
            let table: toml::Value =
                toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| parse_err(format!("missing key '{toml_key}' in TOML file")))?
                .clone();
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_err(e.to_string()))
        }
    }
}

// ===========================================================================
// Catalog loading
// ===========================================================================

/// Load a complete catalog from a data directory.
///
/// Requires `items` and `recipes` files; a `talents` file is optional. Every
/// item reference in recipes and talents is resolved against the item table,
/// so items must be self-contained.
pub fn load_catalog(dir: &Path) -> Result<Catalog, DataLoadError> {
    let items_path = require_data_file(dir, "items")?;
    let recipes_path = require_data_file(dir, "recipes")?;
    let talents_path = find_data_file(dir, "talents")?;

    let items: Vec<ItemData> = deserialize_list(&items_path, "items")?;
    let recipes: Vec<RecipeData> = deserialize_list(&recipes_path, "recipes")?;
    let talents: Vec<TalentData> = match &talents_path {
        Some(path) => deserialize_list(path, "talents")?,
        None => Vec::new(),
    };

    let mut builder = CatalogBuilder::new();

    for item in items {
        builder.register_item(ItemDef {
            name: item.name,
            category: item.category,
            tier: item.tier,
            volume: item.volume,
            transfer_batch_size: item.transfer_batch_size,
            transfer_time: item.transfer_time,
        })?;
    }

    for recipe in recipes {
        let product = resolve_item(&builder, &recipe.product, &recipes_path)?;
        let mut ingredients = Vec::with_capacity(recipe.ingredients.len());
        for ingredient in &recipe.ingredients {
            let id = resolve_item(&builder, ingredient.item(), &recipes_path)?;
            ingredients.push((id, ingredient.quantity()));
        }
        let mut byproducts = Vec::with_capacity(recipe.byproducts.len());
        for (name, quantity) in &recipe.byproducts {
            let id = resolve_item(&builder, name, &recipes_path)?;
            byproducts.push((id, *quantity));
        }
        builder.register_recipe(RecipeDef {
            product,
            quantity: recipe.quantity,
            time: recipe.time,
            industry: recipe.industry,
            ingredients,
            byproducts,
        })?;
    }

    if let Some(path) = &talents_path {
        for talent in talents {
            let scope = match talent.scope {
                TalentScopeData::AllItems => TalentScope::AllItems,
                TalentScopeData::Item(name) => {
                    TalentScope::Item(resolve_item(&builder, &name, path)?)
                }
                TalentScopeData::Category(category) => TalentScope::Category(category),
                TalentScopeData::Tier(tier) => TalentScope::Tier(tier),
            };
            builder.register_talent(TalentDef {
                name: talent.name,
                kind: talent.kind,
                per_level: talent.per_level,
                scope,
            });
        }
    }

    Ok(builder.build()?)
}

fn resolve_item(
    builder: &CatalogBuilder,
    name: &str,
    file: &Path,
) -> Result<ItemId, DataLoadError> {
    builder
        .item_id(name)
        .ok_or_else(|| DataLoadError::UnresolvedItem {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
}

// ===========================================================================
// Tests
// ===========================================================================
