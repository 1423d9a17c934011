//! Columnar Response Index
//!
//! [`HistResponse`] keeps column definitions apart from row values. Columns
//! are addressed by position or by KPI type through a lazily built index.
//! When a KPI type appears more than once, the first column wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::LookupError;
use crate::types::{ColumnConfig, Item};

/// Historical data response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HistResponse {
    #[serde(default)]
    pub configs: Vec<ColumnConfig>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(skip)]
    index: OnceLock<HashMap<String, usize>>,
}

impl PartialEq for HistResponse {
    fn eq(&self, other: &Self) -> bool {
        self.configs == other.configs && self.items == other.items
    }
}

impl HistResponse {
    pub fn new(configs: Vec<ColumnConfig>, items: Vec<Item>) -> Self {
        Self {
            configs,
            items,
            index: OnceLock::new(),
        }
    }

    /// Build the KPI type index. Later calls, concurrent or not, reuse it.
    pub fn build_index(&self) -> &HashMap<String, usize> {
        self.index.get_or_init(|| {
            let mut index = HashMap::with_capacity(self.configs.len());
            for (position, config) in self.configs.iter().enumerate() {
                // first match wins
                index.entry(config.kpi_type.clone()).or_insert(position);
            }
            index
        })
    }

    pub fn is_index_built(&self) -> bool {
        self.index.get().is_some()
    }

    /// Column position of `kpi_type`.
    pub fn column_index(&self, kpi_type: &str) -> Option<usize> {
        self.build_index().get(kpi_type).copied()
    }

    /// Values of one column across all rows. Rows without the column read as 0.
    pub fn get_values_by_column_index(&self, index: usize) -> Result<Vec<i64>, LookupError> {
        if index >= self.configs.len() {
            return Err(LookupError::ColumnOutOfRange {
                index,
                len: self.configs.len(),
            });
        }

        Ok(self
            .items
            .iter()
            .map(|item| item.values.get(index).map_or(0, |v| v.get()))
            .collect())
    }

    /// Values of the first column whose KPI type is `name`.
    pub fn get_values_by_kpi_type(&self, name: &str) -> Result<Vec<i64>, LookupError> {
        let index = self
            .column_index(name)
            .ok_or_else(|| LookupError::UnknownKpiType {
                name: name.to_string(),
            })?;
        self.get_values_by_column_index(index)
    }

    /// Values of the first column whose config id is `id`.
    pub fn get_values_by_config_id(&self, id: &str) -> Result<Vec<i64>, LookupError> {
        let index = self
            .configs
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| LookupError::UnknownConfigId { id: id.to_string() })?;
        self.get_values_by_column_index(index)
    }

    /// Row timestamps in row order.
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.items.iter().map(|item| item.timestamp.get()).collect()
    }
}
