//! Import helpers for simplifying resource import implementations

use crate::context::Context;
use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Dynamic, DynamicValue};
use std::collections::HashMap;

/// Sets the import ID to a specific attribute in state
///
/// This is useful for simple resources where the import ID maps directly to
/// a single attribute in the resource state.
///
/// Example: ID "vm-123" -> state.id = "vm-123"
pub fn import_state_passthrough_id(
    _ctx: &Context,
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let mut state = DynamicValue::new(Dynamic::Map(HashMap::new()));

    if let Err(e) = state.set_string(&attr_path, request.id.clone()) {
        response.diagnostics.push(crate::types::Diagnostic {
            severity: crate::types::DiagnosticSeverity::Error,
            summary: format!("Failed to set import ID: {}", e),
            detail: format!(
                "Could not set attribute '{:?}' to value '{}'",
                attr_path, request.id
            ),
            attribute: Some(attr_path),
        });
        return;
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
    });
}

/// Splits a two-part import ID of the form `"<first>.<second>"` and sets
/// each half on its own attribute.
///
/// Resources owned by a parent object import with composite IDs, for
/// example `"<vlan_id>.<network_id>"` or `"<machine_id>.<snapshot_id>"`.
/// The split happens at the first `.`; the remainder may itself contain
/// dots (UUIDs never do, but snapshot names can).
pub fn import_state_composite_id(
    _ctx: &Context,
    first_path: AttributePath,
    second_path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let Some((first, second)) = request.id.split_once('.') else {
        response.diagnostics.push(crate::types::Diagnostic::error(
            "Invalid import ID",
            format!(
                "Expected an ID of the form \"<first>.<second>\", got '{}'",
                request.id
            ),
        ));
        return;
    };

    if first.is_empty() || second.is_empty() {
        response.diagnostics.push(crate::types::Diagnostic::error(
            "Invalid import ID",
            format!(
                "Both halves of a composite import ID must be non-empty, got '{}'",
                request.id
            ),
        ));
        return;
    }

    let mut state = DynamicValue::new(Dynamic::Map(HashMap::new()));
    for (path, value) in [(first_path, first), (second_path, second)] {
        if let Err(e) = state.set_string(&path, value.to_string()) {
            response.diagnostics.push(crate::types::Diagnostic {
                severity: crate::types::DiagnosticSeverity::Error,
                summary: format!("Failed to set import ID: {}", e),
                detail: format!("Could not set attribute '{:?}' to value '{}'", path, value),
                attribute: Some(path),
            });
            return;
        }
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import_request(id: &str) -> ImportResourceStateRequest {
        ImportResourceStateRequest {
            type_name: "triton_snapshot".to_string(),
            id: id.to_string(),
        }
    }

    #[test]
    fn passthrough_sets_id_attribute() {
        let ctx = Context::new();
        let request = import_request("vm-123");
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };

        import_state_passthrough_id(
            &ctx,
            AttributePath::new("id"),
            &request,
            &mut response,
        );

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.imported_resources.len(), 1);
        let state = &response.imported_resources[0].state;
        assert_eq!(
            state.get_string(&AttributePath::new("id")).unwrap(),
            "vm-123"
        );
    }

    #[test]
    fn composite_splits_on_first_dot() {
        let ctx = Context::new();
        let request = import_request("machine-1.snap.daily");
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };

        import_state_composite_id(
            &ctx,
            AttributePath::new("machine_id"),
            AttributePath::new("id"),
            &request,
            &mut response,
        );

        assert!(response.diagnostics.is_empty());
        let state = &response.imported_resources[0].state;
        assert_eq!(
            state.get_string(&AttributePath::new("machine_id")).unwrap(),
            "machine-1"
        );
        assert_eq!(
            state.get_string(&AttributePath::new("id")).unwrap(),
            "snap.daily"
        );
    }

    #[test]
    fn composite_rejects_missing_separator() {
        let ctx = Context::new();
        let request = import_request("no-separator");
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };

        import_state_composite_id(
            &ctx,
            AttributePath::new("machine_id"),
            AttributePath::new("id"),
            &request,
            &mut response,
        );

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.imported_resources.is_empty());
    }
}
