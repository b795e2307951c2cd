//! Validation and normalization of the raw configuration
//!
//! Every rule here runs at load time, before any handler is invoked, so a
//! bad file fails the whole run without side effects.

use std::collections::HashSet;
use std::path::PathBuf;

use super::manifest::{RawConfig, RawDataset};
use super::{DataConfig, Dataset, Defaults, SUPPORTED_ALGO, SUPPORTED_VERSION};
use crate::policy::Policy;
use crate::source::SourceSpec;
use crate::{Error, Result};

/// Normalize a dataset's `source` / `sources` fields into an ordered list.
///
/// Messages are not prefixed with the dataset id; [`resolve`] adds it.
pub fn resolve_sources(dataset: &RawDataset) -> Result<Vec<SourceSpec>> {
    let sources = match (&dataset.source, &dataset.sources) {
        (Some(_), Some(_)) => return Err(Error::config("ambiguous source configuration")),
        (None, None) => return Err(Error::config("missing source configuration")),
        (Some(single), None) => vec![single.clone()],
        (None, Some(list)) if list.is_empty() => {
            return Err(Error::config("missing source configuration"));
        }
        (None, Some(list)) => list.clone(),
    };

    if let Some(position) = sources.iter().position(|s| s.kind.trim().is_empty()) {
        return Err(Error::config(format!("source {} has an empty type", position + 1)));
    }

    Ok(sources)
}

/// Turn a parsed file into a validated [`DataConfig`].
pub fn resolve(raw: RawConfig) -> Result<DataConfig> {
    let version = raw.version.unwrap_or(SUPPORTED_VERSION);
    if version != SUPPORTED_VERSION {
        return Err(Error::config(format!(
            "unsupported config version {version} (supported: {SUPPORTED_VERSION})"
        )));
    }

    let algo = non_empty(raw.defaults.algo).unwrap_or_else(|| SUPPORTED_ALGO.to_string());
    if algo != SUPPORTED_ALGO {
        return Err(Error::config(format!(
            "unsupported defaults.algo {algo:?} (supported: {SUPPORTED_ALGO})"
        )));
    }

    let default_policy = non_empty(raw.defaults.policy)
        .map(Policy::from)
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let mut datasets = Vec::with_capacity(raw.datasets.len());

    for (index, dataset) in raw.datasets.into_iter().enumerate() {
        if dataset.id.trim().is_empty() {
            return Err(Error::config(format!("dataset {} has an empty id", index + 1)));
        }
        if !seen.insert(dataset.id.clone()) {
            return Err(Error::config(format!("duplicate dataset id {:?}", dataset.id)));
        }
        if dataset.target.trim().is_empty() {
            return Err(Error::config(format!("dataset {:?} has an empty target", dataset.id)));
        }

        let sources = resolve_sources(&dataset).map_err(|e| match e {
            Error::Configuration { message } => {
                Error::config(format!("dataset {:?}: {message}", dataset.id))
            }
            other => other,
        })?;

        let policy = non_empty(dataset.policy)
            .map(Policy::from)
            .unwrap_or_else(|| default_policy.clone());

        datasets.push(Dataset {
            id: dataset.id,
            desc: dataset.desc,
            target: PathBuf::from(dataset.target),
            policy,
            sources,
        });
    }

    tracing::debug!(datasets = datasets.len(), "Resolved configuration");

    Ok(DataConfig {
        version,
        defaults: Defaults {
            policy: default_policy,
            algo,
        },
        datasets,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
