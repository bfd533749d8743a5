//! crates/assessment_core/src/catalog.rs
//!
//! The hierarchical questionnaire definition (areas → scales → items) as it
//! arrives from the data file, and its flattening into the ordered sequence
//! of scoring items served to sessions.

use serde::Deserialize;

use crate::domain::CatalogItem;

fn default_scale_max() -> i64 {
    6
}

/// The nested questionnaire structure, deserialized from the data file.
#[derive(Debug, Clone, Deserialize)]
pub struct TestStructure {
    pub areas: Vec<Area>,
    /// Upper bound of the Likert answer range; answers run 1..=scale_max.
    #[serde(default = "default_scale_max")]
    pub scale_max: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Area {
    #[serde(default)]
    pub name: String,
    pub scales: Vec<ScaleDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScaleDef {
    pub name: String,
    pub items: Vec<ItemDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemDef {
    pub text: String,
    pub reverse: bool,
}

/// The flattened catalog: every item in presentation order, each carrying
/// its owning scale name and reverse flag. Built once at startup and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub items: Vec<CatalogItem>,
    pub scale_max: i64,
}

impl TestStructure {
    /// Flattens area by area, scale by scale, item by item.
    pub fn flatten(&self) -> Catalog {
        let items = self
            .areas
            .iter()
            .flat_map(|area| &area.scales)
            .flat_map(|scale| {
                scale.items.iter().map(|item| CatalogItem {
                    text: item.text.clone(),
                    scale: scale.name.clone(),
                    reverse: item.reverse,
                })
            })
            .collect();
        Catalog {
            items,
            scale_max: self.scale_max,
        }
    }
}
