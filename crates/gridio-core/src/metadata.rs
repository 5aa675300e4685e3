//! Global attributes written into newly created dataset files.

use serde::{Deserialize, Serialize};

use crate::convention::UG_CONV_MIN_VERSION;

/// Provenance written to the global attributes of a new dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetadata {
    /// Name of the producing model (`institution`).
    pub model_name: String,
    /// Producing application (`source`).
    pub source: String,
    /// UGRID version declared in `Conventions`.
    pub ugrid_version: String,
}

impl GlobalMetadata {
    /// Metadata with explicit fields.
    pub fn new(
        model_name: impl Into<String>,
        source: impl Into<String>,
        ugrid_version: impl Into<String>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            source: source.into(),
            ugrid_version: ugrid_version.into(),
        }
    }

    /// The `Conventions` attribute value, e.g. `CF-1.8 UGRID-1.0`.
    pub fn conventions(&self) -> String {
        format!("CF-1.8 UGRID-{}", self.ugrid_version)
    }
}

impl Default for GlobalMetadata {
    fn default() -> Self {
        Self::new(
            "Unknown model",
            concat!("gridio ", env!("CARGO_PKG_VERSION")),
            format!("{UG_CONV_MIN_VERSION:.1}"),
        )
    }
}
