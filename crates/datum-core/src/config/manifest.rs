//! On-disk shape of the configuration file
//!
//! These types mirror the file one to one and accept anything that parses.
//! Semantic rules are applied afterwards by the resolver.

use serde::{Deserialize, Serialize};

use crate::source::SourceSpec;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub version: Option<u32>,

    #[serde(default)]
    pub defaults: RawDefaults,

    #[serde(default)]
    pub datasets: Vec<RawDataset>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDefaults {
    #[serde(default)]
    pub policy: Option<String>,

    #[serde(default)]
    pub algo: Option<String>,
}

/// A dataset as written, with both source forms still present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDataset {
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,

    #[serde(default)]
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceSpec>>,
}
