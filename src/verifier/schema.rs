//! Local JSON-Schema validation strategy (spec.md §4.4.3). No I/O.

use async_trait::async_trait;
use jsonschema::{Draft, JSONSchema};
use serde::Serialize;
use serde_json::{json, Value};

use super::{VerifierDescriptor, VerifyRequest, VerifyResult, Verifier};
use crate::error::VerificationErrorKind;

/// One schema-validation violation, in the shape spec.md §4.4.3 requires.
#[derive(Serialize)]
struct ValidationErrorDetail {
    path: String,
    message: String,
    schema_path: String,
}

/// Validates `payload` (parsed as JSON) against the contract's
/// `requirements_schema`.
#[derive(Default)]
pub struct SchemaVerifier;

#[async_trait]
impl Verifier for SchemaVerifier {
    async fn verify(&self, request: &VerifyRequest) -> VerifyResult {
        if !matches!(request.descriptor, VerifierDescriptor::Schema) {
            return VerifyResult::reject("schema verifier invoked with a mismatched descriptor");
        }

        let Some(schema) = request.requirements_schema.as_ref() else {
            return VerifyResult::strategy_error(&VerificationErrorKind::MissingSchema, json!({}));
        };

        let payload: Value = match serde_json::from_slice(&request.payload) {
            Ok(value) => value,
            Err(e) => {
                let preview: String = String::from_utf8_lossy(&request.payload)
                    .chars()
                    .take(500)
                    .collect();
                return VerifyResult::strategy_error(
                    &VerificationErrorKind::InvalidJson(e.to_string()),
                    json!({"raw_payload_preview": preview}),
                );
            }
        };

        let compiled = match JSONSchema::options().with_draft(Draft::Draft7).compile(schema) {
            Ok(compiled) => compiled,
            Err(e) => {
                return VerifyResult::strategy_error(
                    &VerificationErrorKind::InvalidSchema(e.to_string()),
                    json!({}),
                );
            }
        };

        match compiled.validate(&payload) {
            Ok(()) => VerifyResult::pass(1.0, "payload validated against the requirements schema")
                .with_logs(json!({"schema": schema})),
            Err(errors) => {
                let mut details: Vec<ValidationErrorDetail> = errors
                    .map(|e| ValidationErrorDetail {
                        path: e.instance_path.to_string(),
                        message: e.to_string(),
                        schema_path: e.schema_path.to_string(),
                    })
                    .collect();
                details.sort_by(|a, b| a.path.cmp(&b.path));

                let count = details.len();
                VerifyResult::reject(format!("{count} error(s)"))
                    .with_logs(json!({"validation_errors": details}))
            }
        }
    }
}
