//! Historical Data Types
//!
//! Wire shapes of the historical KPI endpoint.

use serde::{Deserialize, Deserializer, Serialize};

use crate::decode::{FlexibleInt, FlexibleTimestamp};

/// Column definition. Position in the config list is the column index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub id: String,
    #[serde(rename = "providerId")]
    pub provider_id: String,
    #[serde(rename = "data_source_type")]
    pub source_type: String,
    #[serde(rename = "data_source_name")]
    pub source_name: String,
    pub kpi_type: String,
    pub data_type: String,
    pub unit: String,
    pub aggregation_type: String,
}

impl ColumnConfig {
    /// Config with only the KPI type set.
    pub fn with_kpi_type(kpi_type: impl Into<String>) -> Self {
        Self {
            kpi_type: kpi_type.into(),
            ..Default::default()
        }
    }
}

/// One row. `values` aligns positionally with the configs and may be shorter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub timestamp: FlexibleTimestamp,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub values: Vec<FlexibleInt>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<FlexibleInt>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<FlexibleInt>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Query parameters of the historical data request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistQuery {
    pub from: String,
    pub to: String,
    pub granularity: String,
    pub tags: String,
    pub aggregation_type: String,
}

impl HistQuery {
    /// Create query for a time range.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Default::default()
        }
    }

    /// Set granularity.
    pub fn granularity(mut self, granularity: impl Into<String>) -> Self {
        self.granularity = granularity.into();
        self
    }

    /// Set tags filter.
    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Set aggregation type.
    pub fn aggregation_type(mut self, aggregation_type: impl Into<String>) -> Self {
        self.aggregation_type = aggregation_type.into();
        self
    }

    /// Query pairs in wire order.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("from", self.from.clone()),
            ("to", self.to.clone()),
            ("granularity", self.granularity.clone()),
            ("tags", self.tags.clone()),
            ("aggregation_type", self.aggregation_type.clone()),
        ]
    }
}
