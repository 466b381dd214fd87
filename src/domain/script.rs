//! Script definitions and the column layouts they imply.
//!
//! A script names the kind of remote object every CSV row targets, plus the
//! default method and parameters used when a row leaves those columns empty.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolleyError};

/// Category of remote object a script targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptType {
    File,
    #[serde(rename = "File Item", alias = "FileItem")]
    FileItem,
    Item,
    List,
    Site,
}

impl ScriptType {
    pub const ALL: [ScriptType; 5] = [
        ScriptType::File,
        ScriptType::FileItem,
        ScriptType::Item,
        ScriptType::List,
        ScriptType::Site,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptType::File => "File",
            ScriptType::FileItem => "File Item",
            ScriptType::Item => "Item",
            ScriptType::List => "List",
            ScriptType::Site => "Site",
        }
    }

    /// Positional meaning of the CSV columns for this script type.
    pub fn layout(&self) -> &'static ColumnLayout {
        match self {
            ScriptType::File | ScriptType::FileItem => &FILE_LAYOUT,
            ScriptType::Item => &ITEM_LAYOUT,
            ScriptType::List => &LIST_LAYOUT,
            ScriptType::Site => &SITE_LAYOUT,
        }
    }

    /// The CSV template header operators fill in.
    pub fn template_header(&self) -> String {
        self.layout().headers.join(",")
    }

    /// Suffix used for template downloads (`{title}_{suffix}.csv`).
    pub fn template_suffix(&self) -> &'static str {
        match self {
            ScriptType::File | ScriptType::FileItem => "file",
            ScriptType::Item => "item",
            ScriptType::List => "list",
            ScriptType::Site => "site",
        }
    }

    /// Kind of object rows of this type resolve to.
    pub fn target_kind(&self) -> TargetKind {
        match self {
            ScriptType::File => TargetKind::File,
            ScriptType::FileItem => TargetKind::FileAsItem,
            ScriptType::Item => TargetKind::ListItem,
            ScriptType::List => TargetKind::List,
            ScriptType::Site => TargetKind::Site,
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "file" => Ok(ScriptType::File),
            "fileitem" => Ok(ScriptType::FileItem),
            "item" => Ok(ScriptType::Item),
            "list" => Ok(ScriptType::List),
            "site" => Ok(ScriptType::Site),
            _ => Err(format!("Invalid script type: {}", s)),
        }
    }
}

/// Kind of a resolved remote object.
///
/// Used to pick the method registry and to word resolution failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    File,
    FileAsItem,
    ListItem,
    List,
    Site,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::File => "file",
            TargetKind::FileAsItem => "file_as_item",
            TargetKind::ListItem => "list_item",
            TargetKind::List => "list",
            TargetKind::Site => "site",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column positions for one script type. `None` means the column is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub headers: &'static [&'static str],
    pub site_url: usize,
    pub list_name: Option<usize>,
    pub list_id: Option<usize>,
    pub file_url: Option<usize>,
    pub item_id: Option<usize>,
    pub method: usize,
    pub parameters: usize,
}

impl ColumnLayout {
    /// Position of a template column by its header name.
    pub fn position(&self, header: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(header))
    }
}

static FILE_LAYOUT: ColumnLayout = ColumnLayout {
    headers: &["Site Url", "List Name", "File Url", "Method", "Parameters"],
    site_url: 0,
    list_name: Some(1),
    list_id: None,
    file_url: Some(2),
    item_id: None,
    method: 3,
    parameters: 4,
};

static ITEM_LAYOUT: ColumnLayout = ColumnLayout {
    headers: &["Site Url", "List Name", "Item ID", "Method", "Parameters"],
    site_url: 0,
    list_name: Some(1),
    list_id: None,
    file_url: None,
    item_id: Some(2),
    method: 3,
    parameters: 4,
};

static LIST_LAYOUT: ColumnLayout = ColumnLayout {
    headers: &["Site Url", "List ID", "List Name", "Method", "Parameters"],
    site_url: 0,
    list_name: Some(2),
    list_id: Some(1),
    file_url: None,
    item_id: None,
    method: 3,
    parameters: 4,
};

static SITE_LAYOUT: ColumnLayout = ColumnLayout {
    headers: &["Site Url", "Method", "Parameters"],
    site_url: 0,
    list_name: None,
    list_id: None,
    file_url: None,
    item_id: None,
    method: 1,
    parameters: 2,
};

/// A script definition: what to run against every row of a CSV.
///
/// Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptConfig {
    pub title: String,
    pub script_type: ScriptType,
    /// Default method, used when a row's Method column is empty
    #[serde(default)]
    pub method: String,
    /// Default JSON-encoded parameters, used when a row's Parameters column is empty
    #[serde(default)]
    pub parameters: String,
}

impl ScriptConfig {
    pub fn new(title: impl Into<String>, script_type: ScriptType) -> Self {
        Self {
            title: title.into(),
            script_type,
            method: String::new(),
            parameters: String::new(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_parameters(mut self, parameters: impl Into<String>) -> Self {
        self.parameters = parameters.into();
        self
    }

    /// Load a script definition from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: ScriptConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject default parameters that are not JSON.
    ///
    /// Row-level parameters are decoded leniently; the defaults are checked
    /// up front so a typo does not silently drop arguments on every row.
    pub fn validate(&self) -> Result<()> {
        if self.parameters.trim().is_empty() {
            return Ok(());
        }
        crate::args::try_decode(&self.parameters).map_err(|e| {
            VolleyError::Validation(format!(
                "The parameters need to be in JSON format. ({})",
                e
            ))
        })?;
        Ok(())
    }

    /// Default file name for result exports.
    pub fn export_file_name(&self) -> String {
        format!("{}_results.csv", self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_type_parses_display_labels() {
        assert_eq!("File Item".parse::<ScriptType>().unwrap(), ScriptType::FileItem);
        assert_eq!("file-item".parse::<ScriptType>().unwrap(), ScriptType::FileItem);
        assert_eq!("SITE".parse::<ScriptType>().unwrap(), ScriptType::Site);
        assert!("folder".parse::<ScriptType>().is_err());
    }

    #[test]
    fn template_headers_match_layouts() {
        assert_eq!(
            ScriptType::File.template_header(),
            "Site Url,List Name,File Url,Method,Parameters"
        );
        assert_eq!(
            ScriptType::Item.template_header(),
            "Site Url,List Name,Item ID,Method,Parameters"
        );
        assert_eq!(
            ScriptType::List.template_header(),
            "Site Url,List ID,List Name,Method,Parameters"
        );
        assert_eq!(ScriptType::Site.template_header(), "Site Url,Method,Parameters");
        assert_eq!(
            ScriptType::FileItem.template_header(),
            ScriptType::File.template_header()
        );
    }

    #[test]
    fn script_config_deserializes_camel_case() {
        let json = r#"{"title":"Checkin","scriptType":"File Item","method":"update","parameters":"{\"Title\":\"x\"}"}"#;
        let config: ScriptConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.script_type, ScriptType::FileItem);
        assert_eq!(config.method, "update");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_json_defaults() {
        let config = ScriptConfig::new("bad", ScriptType::Site).with_parameters("{oops");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("JSON format"));
    }

    #[test]
    fn layout_positions_by_header() {
        let layout = ScriptType::List.layout();
        assert_eq!(layout.position("list id"), Some(1));
        assert_eq!(layout.position("File Url"), None);
    }
}
