// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Upload-request handler: validate, stage, launch, report.

use std::collections::BTreeMap;

use async_trait::async_trait;
use cds_bus::{MessageMeta, Notifier, Outcome, TypedHandler};
use cds_cluster::ClusterApi;
use cds_core::{random_string, sanitize_job_name, sanitize_label};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::ResponderConfig;
use crate::inmeta::InmetaSchema;
use crate::staging;
use crate::template::JobTemplate;
use crate::SchemaError;

/// Topic pattern upload requests arrive on.
pub const UPLOAD_ROUTING_PATTERN: &str = "deliverables.syndication.*.upload";

/// Entry point of the batch container.
const CDS_RUN: &str = "/usr/local/bin/cds_run.pl";

/// An upload request. Optional identifiers may be explicitly null;
/// unknown fields ride along and are echoed back in our reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub inmeta: String,
    pub routename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliverable_asset: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliverable_bundle: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nearline_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn upload_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "deliverable_asset": { "type": ["integer", "null"] },
            "deliverable_bundle": { "type": ["integer", "null"] },
            "filename": { "type": ["string", "null"] },
            "online_id": { "type": ["string", "null"] },
            "nearline_id": { "type": ["string", "null"] },
            "archive_id": { "type": ["string", "null"] },
            "inmeta": { "type": "string" },
            "routename": { "type": "string" },
        },
        "required": ["inmeta", "routename"],
    })
}

/// Handles `deliverables.syndication.*.upload`: XSD-validates the inmeta,
/// stages it to the shared filesystem, materialises a job from the
/// template and submits it, reporting `started` or `invalid` back onto
/// the system exchange.
pub struct LaunchHandler<N: Notifier, C: ClusterApi> {
    validator: jsonschema::Validator,
    inmeta_schema: InmetaSchema,
    template: JobTemplate,
    cluster: C,
    sender: N,
    config: ResponderConfig,
}

impl<N: Notifier, C: ClusterApi> LaunchHandler<N, C> {
    pub fn new(
        config: ResponderConfig,
        inmeta_schema: InmetaSchema,
        template: JobTemplate,
        cluster: C,
        sender: N,
    ) -> Result<Self, SchemaError> {
        let schema = upload_schema();
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| SchemaError(e.to_string()))?;
        Ok(Self { validator, inmeta_schema, template, cluster, sender, config })
    }

    /// Publish an `invalid` report; failures to report are logged, the
    /// message is being nacked regardless.
    async fn report_invalid(&self, body: serde_json::Map<String, Value>) {
        if let Err(e) = self.sender.notify("cds.job.invalid", &Value::Object(body)).await {
            error!(error = %e, "could not inform exchange of job failure");
        }
    }
}

#[async_trait]
impl<N: Notifier, C: ClusterApi> TypedHandler for LaunchHandler<N, C> {
    type Message = UploadRequest;

    fn routing_pattern(&self) -> &str {
        UPLOAD_ROUTING_PATTERN
    }

    fn validator(&self) -> &jsonschema::Validator {
        &self.validator
    }

    async fn on_message(&self, meta: MessageMeta<'_>, request: UploadRequest) -> Outcome {
        info!(
            exchange = meta.exchange,
            routing_key = meta.routing_key,
            tag = meta.delivery_tag,
            "received upload request"
        );

        if let Err(failure) = self.inmeta_schema.validate(&request.inmeta) {
            error!(log = %failure, "inmeta term did not validate as an xml inmeta document");
            error!(content = %request.inmeta, "offending content");
            let mut body = enriched(&request);
            body.insert("error".to_string(), Value::String(failure.to_string()));
            self.report_invalid(body).await;
            return Outcome::nack("inmeta failed schema validation");
        }

        let hint = filename_hint(&request);
        let inmeta_file = match staging::write_out_inmeta(
            self.config.inmeta_path.as_deref(),
            &hint,
            &request.inmeta,
        ) {
            Ok(path) => path,
            Err(e) => {
                error!(error = %e, "could not stage inmeta content");
                return Outcome::nack(e.to_string());
            }
        };

        let job_name = format!("cds-{}-{}", sanitize_job_name(&hint), random_string(4));
        let command = vec![
            CDS_RUN.to_string(),
            "--input-inmeta".to_string(),
            inmeta_file.display().to_string(),
            "--route".to_string(),
            request.routename.clone(),
        ];
        let job = self
            .template
            .builder()
            .name(&job_name)
            .command(command)
            .labels(build_labels(&request))
            .build();

        let job_ref = match self.cluster.create_job(&self.config.namespace, &job).await {
            Ok(job_ref) => job_ref,
            Err(e) => {
                error!(job = %job_name, error = %e, "could not launch job");
                if let Err(io) = std::fs::remove_file(&inmeta_file) {
                    warn!(path = %inmeta_file.display(), error = %io, "could not remove staged inmeta");
                }
                let mut body = enriched(&request);
                body.insert("job-name".to_string(), Value::String(job_name));
                body.insert("error".to_string(), Value::String(e.to_string()));
                body.insert("traceback".to_string(), Value::String(error_chain(&e)));
                self.report_invalid(body).await;
                return Outcome::nack("job submission failed");
            }
        };

        info!(job = %job_ref.name, uid = %job_ref.uid, "job launched");
        let mut body = enriched(&request);
        body.insert("job-id".to_string(), Value::String(job_ref.uid));
        body.insert("job-name".to_string(), Value::String(job_ref.name));
        body.insert("job-namespace".to_string(), Value::String(job_ref.namespace));
        match self.sender.notify("cds.job.started", &Value::Object(body)).await {
            Ok(true) => Outcome::Ack,
            Ok(false) => {
                error!("job started but the acknowledgement could not be sent");
                Outcome::nack("started report not sent")
            }
            Err(e) => {
                error!(error = %e, "job started but could not inform exchange");
                Outcome::nack("started report failed")
            }
        }
    }
}

/// First non-null identifier, else a random 10-char name.
fn filename_hint(request: &UploadRequest) -> String {
    request
        .filename
        .clone()
        .or_else(|| request.online_id.clone())
        .or_else(|| request.nearline_id.clone())
        .or_else(|| request.archive_id.clone())
        .unwrap_or_else(|| random_string(10))
}

/// Identifier labels stamped onto launched jobs. Absent identifiers are
/// recorded as the literal `"None"` so the labels are always present to
/// select on.
fn build_labels(request: &UploadRequest) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(
        "deliverable-asset-id".to_string(),
        label_value(request.deliverable_asset.map(|v| v.to_string())),
    );
    labels.insert(
        "deliverable-bundle-id".to_string(),
        label_value(request.deliverable_bundle.map(|v| v.to_string())),
    );
    labels.insert("online-id".to_string(), label_value(request.online_id.clone()));
    labels.insert("nearline-id".to_string(), label_value(request.nearline_id.clone()));
    labels.insert("archive-id".to_string(), label_value(request.archive_id.clone()));
    labels
}

fn label_value(value: Option<String>) -> String {
    sanitize_label(&value.unwrap_or_else(|| "None".to_string()))
}

/// The request as a JSON object, ready to be enriched and reported.
fn enriched(request: &UploadRequest) -> serde_json::Map<String, Value> {
    match serde_json::to_value(request) {
        Ok(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

/// Render an error and its source chain, the report's `traceback` field.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
#[path = "launch_tests.rs"]
mod tests;
