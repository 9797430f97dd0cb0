//! Minimal OpenAPI document model.
//!
//! Only the parts needed for deprecation detection are modelled: the `paths`
//! object, the operations under each path item, and their parameters.

use crate::error::{DeprecationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// An OpenAPI document, reduced to its `paths` object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenApiDocument {
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
}

impl OpenApiDocument {
    /// Load a document from a JSON or YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Locate the operation for an exact path key and a method.
    ///
    /// The method is matched case-insensitively against the lowercase keys
    /// of the path item. No path templating is performed.
    pub fn find_operation(&self, path: &str, method: &str) -> Result<&Operation> {
        let item = self
            .paths
            .get(path)
            .ok_or_else(|| DeprecationError::PathNotFound {
                path: path.to_string(),
            })?;

        item.operation(method)
            .ok_or_else(|| DeprecationError::MethodNotFound {
                path: path.to_string(),
                method: method.to_uppercase(),
            })
    }
}

/// Operations declared under a single path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Operation>,
}

impl PathItem {
    pub fn operation(&self, method: &str) -> Option<&Operation> {
        match method.to_lowercase().as_str() {
            "get" => self.get.as_ref(),
            "put" => self.put.as_ref(),
            "post" => self.post.as_ref(),
            "delete" => self.delete.as_ref(),
            "options" => self.options.as_ref(),
            "head" => self.head.as_ref(),
            "patch" => self.patch.as_ref(),
            "trace" => self.trace.as_ref(),
            _ => None,
        }
    }
}

/// A single operation object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,

    /// Absent means not deprecated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,

    /// `None` when the operation has no `parameters` field at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Parameter>>,
}

/// A parameter object. Unresolved `$ref` entries deserialize with an empty
/// name and no location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub name: String,

    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ParameterLocation>,

    #[serde(default)]
    pub deprecated: bool,
}

/// Where a parameter is carried in the request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Path,
    Header,
    Cookie,
}
