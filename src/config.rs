//! The household configuration: who can spend money and how they are drawn in charts.

use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Colors handed out to members without a configured color, in member order.
const PALETTE: [&str; 4] = ["#8884d8", "#82ca9d", "#ffc658", "#ff8042"];

/// The color for names that are not household members.
const OTHER_COLOR: &str = "#9e9e9e";

/// The closed set of household members and their chart colors.
///
/// Changing the configuration never requires changes to the aggregation
/// code: members only constrain which names may be submitted and the order
/// and colors of chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// The household members, in display order.
    pub members: Vec<String>,
    /// Display colors keyed by member name.
    #[serde(default)]
    pub colors: BTreeMap<String, String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            members: ["ママ", "パパ", "はやと", "いちか"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            colors: BTreeMap::new(),
        }
    }
}

impl LedgerConfig {
    /// Read a JSON configuration file.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] if the file cannot be read, is not
    /// valid JSON, or fails [LedgerConfig::check].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|error| Error::InvalidConfig(format!("could not read {path:?}: {error}")))?;

        Self::from_json(&text)
    }

    /// Parse a JSON configuration string.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] if `text` is not a valid configuration.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let config: Self =
            serde_json::from_str(text).map_err(|error| Error::InvalidConfig(error.to_string()))?;
        config.check()?;

        Ok(config)
    }

    /// Check that there is at least one member and no member is listed twice.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] describing the first problem found.
    pub fn check(&self) -> Result<(), Error> {
        if self.members.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one household member is required".to_owned(),
            ));
        }

        let mut seen = HashSet::new();
        for member in &self.members {
            if member.trim().is_empty() {
                return Err(Error::InvalidConfig("member names cannot be blank".to_owned()));
            }

            if !seen.insert(member.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "\"{member}\" is listed more than once"
                )));
            }
        }

        Ok(())
    }

    /// Whether `name` is a household member.
    pub fn is_member(&self, name: &str) -> bool {
        self.members.iter().any(|member| member == name)
    }

    /// The display color for `name`.
    ///
    /// Configured colors win, then members get a palette color by position,
    /// and anything else is grey.
    pub fn color_for(&self, name: &str) -> String {
        if let Some(color) = self.colors.get(name) {
            return color.clone();
        }

        match self.members.iter().position(|member| member == name) {
            Some(index) => PALETTE[index % PALETTE.len()].to_owned(),
            None => OTHER_COLOR.to_owned(),
        }
    }
}
