//! Operation and parameter deprecation checks against an OpenAPI document.

use crate::error::{DeprecationError, Result};
use crate::openapi::{OpenApiDocument, ParameterLocation};
use tracing::debug;

/// Whether the operation at `path`/`method` is marked deprecated.
///
/// Returns `false` when the operation carries no `deprecated` flag.
pub fn is_operation_deprecated(document: &OpenApiDocument, path: &str, method: &str) -> Result<bool> {
    let operation = document.find_operation(path, method)?;
    let deprecated = operation.deprecated.unwrap_or(false);

    debug!(path = %path, method = %method, deprecated, "Checked operation deprecation");
    Ok(deprecated)
}

/// Check which of the requested query parameters are deprecated.
///
/// A declared parameter is reported only when it is marked deprecated, is
/// named in `requested`, and lives in the query string. The returned names
/// follow declaration order in the document.
pub fn are_parameters_deprecated<S: AsRef<str>>(
    document: &OpenApiDocument,
    path: &str,
    method: &str,
    requested: &[S],
) -> Result<(bool, Vec<String>)> {
    let operation = document.find_operation(path, method)?;
    let parameters =
        operation
            .parameters
            .as_ref()
            .ok_or_else(|| DeprecationError::ParametersNotFound {
                path: path.to_string(),
                method: method.to_uppercase(),
            })?;

    let deprecated: Vec<String> = parameters
        .iter()
        .filter(|p| p.deprecated)
        .filter(|p| p.location == Some(ParameterLocation::Query))
        .filter(|p| requested.iter().any(|r| r.as_ref() == p.name))
        .map(|p| p.name.clone())
        .collect();

    debug!(
        path = %path,
        method = %method,
        deprecated = ?deprecated,
        "Checked parameter deprecation"
    );

    Ok((!deprecated.is_empty(), deprecated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_document() -> OpenApiDocument {
        let json = r#"
{
  "paths": {
    "/users": {
      "get": {
        "deprecated": true,
        "parameters": [
          {"name": "offset", "in": "query"},
          {"name": "limit", "in": "query", "deprecated": true},
          {"name": "id", "in": "path", "deprecated": true},
          {"name": "sort", "in": "query", "deprecated": true},
          {"name": "trace", "in": "header", "deprecated": true}
        ]
      },
      "post": {
        "deprecated": false,
        "parameters": []
      },
      "put": {}
    },
    "/orders": {
      "get": {
        "parameters": [
          {"name": "page", "in": "header", "deprecated": true},
          {"name": "page", "in": "query"}
        ]
      }
    }
  }
}
"#;
        OpenApiDocument::from_json(json).unwrap()
    }

    #[test]
    fn test_operation_deprecated_any_case() {
        let doc = test_document();
        assert!(is_operation_deprecated(&doc, "/users", "GET").unwrap());
        assert!(is_operation_deprecated(&doc, "/users", "get").unwrap());
    }

    #[test]
    fn test_operation_flag_false_or_absent() {
        let doc = test_document();
        assert!(!is_operation_deprecated(&doc, "/users", "POST").unwrap());
        assert!(!is_operation_deprecated(&doc, "/users", "PUT").unwrap());
        assert!(!is_operation_deprecated(&doc, "/orders", "GET").unwrap());
    }

    #[test]
    fn test_operation_not_found() {
        let doc = test_document();
        let err = is_operation_deprecated(&doc, "/missing", "GET").unwrap_err();
        assert!(err.is_not_found());
        let err = is_operation_deprecated(&doc, "/users", "PATCH").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_path_parameter_excluded() {
        let doc = test_document();
        let (deprecated, params) =
            are_parameters_deprecated(&doc, "/users", "GET", &["limit", "id"]).unwrap();
        assert!(deprecated);
        assert_eq!(params, vec!["limit"]);
    }

    #[test]
    fn test_declaration_order_preserved() {
        let doc = test_document();
        let (_, params) =
            are_parameters_deprecated(&doc, "/users", "GET", &["sort", "offset", "limit"]).unwrap();
        assert_eq!(params, vec!["limit", "sort"]);
    }

    #[test]
    fn test_header_parameter_never_reported() {
        let doc = test_document();
        let (deprecated, params) =
            are_parameters_deprecated(&doc, "/orders", "GET", &["page"]).unwrap();
        assert!(!deprecated);
        assert!(params.is_empty());

        let (_, params) = are_parameters_deprecated(&doc, "/users", "GET", &["trace"]).unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn test_unrequested_parameters_ignored() {
        let doc = test_document();
        let requested: Vec<String> = vec!["offset".to_string()];
        let (deprecated, params) =
            are_parameters_deprecated(&doc, "/users", "GET", &requested[..]).unwrap();
        assert!(!deprecated);
        assert!(params.is_empty());
    }

    #[test]
    fn test_missing_parameters_field_is_not_found() {
        let doc = test_document();
        let err = are_parameters_deprecated(&doc, "/users", "PUT", &["limit"]).unwrap_err();
        assert!(matches!(err, DeprecationError::ParametersNotFound { .. }));
    }

    #[test]
    fn test_parameters_for_unknown_path_or_method() {
        let doc = test_document();
        let err = are_parameters_deprecated(&doc, "/missing", "GET", &["limit"]).unwrap_err();
        assert!(matches!(err, DeprecationError::PathNotFound { ref path } if path == "/missing"));
        let err = are_parameters_deprecated(&doc, "/users", "PATCH", &["limit"]).unwrap_err();
        assert!(matches!(err, DeprecationError::MethodNotFound { .. }));
    }

    #[test]
    fn test_empty_parameters_list_is_not_an_error() {
        let doc = test_document();
        let (deprecated, params) =
            are_parameters_deprecated(&doc, "/users", "POST", &["limit"]).unwrap();
        assert!(!deprecated);
        assert!(params.is_empty());
    }
}
