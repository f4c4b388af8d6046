//! Normalizer: upstream workflow payload -> [`NormalizedResult`]
//!
//! The workflow engine's payload shape drifts between versions. Every
//! output field is built through an explicit fallback chain (see
//! [`chain`]), missing data becomes `None`, and a malformed snapshot
//! degrades to no snapshot instead of failing the whole record.
//!
//! [`normalize`] is pure: the receive timestamp is passed in, so the same
//! input always yields the same record.

pub mod chain;
pub mod envelope;
pub mod snapshot;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::model::{
    AnalysisKey, AnalysisStatus, CaptureMetadata, CaptureSummary, DataCaptured, FloorplanRefs,
    NormalizedResult,
};
use chain::{Accessor, Chain, FromField};
pub use envelope::Envelope;

const SUPER_ID: Chain<String> = Chain::new(
    "super_id",
    &[
        Accessor::Path("/super_id"),
        Accessor::Path("/final_result/data_captured/super_id"),
        Accessor::Path("/data_captured/super_id"),
    ],
);

const PROPERTY_URL: Chain<String> = Chain::new(
    "property_url",
    &[
        Accessor::Path("/final_result/data_captured/metadata/property_url"),
        Accessor::Path("/final_result/data_captured/data/property_url"),
        Accessor::Path("/data_captured/metadata/property_url"),
        Accessor::Path("/data_captured/data/property_url"),
        Accessor::Path("/property_url"),
    ],
);

const INLINE_CSV: Chain<String> = Chain::new("inline_csv", &[Accessor::Path("/inline_csv")]);
const CSV_URL: Chain<String> = Chain::new(
    "csv_url",
    &[Accessor::Path("/fp_json_csv_url"), Accessor::Path("/csv_url")],
);
const TOTAL_AREA_CSV_URL: Chain<String> =
    Chain::new("total_area_csv_url", &[Accessor::Path("/total_area_csv_url")]);
const JSON_URL: Chain<String> = Chain::new(
    "json_url",
    &[Accessor::Path("/fp_json_file_url"), Accessor::Path("/json_url")],
);
const LABELME_URL: Chain<String> = Chain::new(
    "labelme_side_by_side_url",
    &[
        Accessor::Path("/image_labelme_side_by_side_url"),
        Accessor::Path("/labelme_side_by_side_url"),
    ],
);

const IMAGE_CONDITION: Chain<Value> = Chain::new(
    "image_condition",
    &[Accessor::Path("/image_condition_data/ica_overall_analysis")],
);

/// Identity fields of a payload: `(super_id, property_url)`
pub fn key_fields(raw: &Value) -> (Option<String>, Option<String>) {
    let root = Envelope::detect(raw).payload();
    (SUPER_ID.resolve(root), PROPERTY_URL.resolve(root))
}

/// Normalize an upstream envelope into the canonical record.
pub fn normalize(raw: &Value, status: AnalysisStatus, received_at: DateTime<Utc>) -> NormalizedResult {
    let root = Envelope::detect(raw).payload();
    let final_result = match root.get("final_result") {
        Some(fr) if fr.is_object() => fr,
        _ => root,
    };

    let floorplan_source = final_result
        .get("floorplan_data")
        .or_else(|| root.get("floorplan_data"))
        .filter(|v| v.is_object());

    let floorplan = floorplan_source
        .map(|fp| FloorplanRefs {
            inline_csv: INLINE_CSV.resolve(fp),
            csv_url: CSV_URL.resolve(fp),
            total_area_csv_url: TOTAL_AREA_CSV_URL.resolve(fp),
            json_url: JSON_URL.resolve(fp),
            labelme_side_by_side_url: LABELME_URL.resolve(fp),
        })
        .unwrap_or_default();

    let image_condition = IMAGE_CONDITION
        .resolve(final_result)
        .or_else(|| IMAGE_CONDITION.resolve(root));

    let data_captured = final_result
        .get("data_captured")
        .or_else(|| root.get("data_captured"))
        .filter(|v| v.is_object())
        .map(data_captured_from);

    NormalizedResult {
        key: AnalysisKey {
            super_id: SUPER_ID.resolve(root),
            property_url: PROPERTY_URL.resolve(root),
            received_at,
        },
        analysis_status: status,
        floorplan,
        image_condition,
        data_captured,
    }
}

fn data_captured_from(dc: &Value) -> DataCaptured {
    let text = |key: &str| dc.get(key).and_then(String::from_field);

    let summary = dc.get("summary").filter(|v| v.is_object()).map(|s| CaptureSummary {
        total_endpoints: s.get("total_endpoints").and_then(u64::from_field),
        completed_endpoints: s.get("completed_endpoints").and_then(u64::from_field),
    });

    let metadata = dc.get("metadata").filter(|v| v.is_object()).map(|m| CaptureMetadata {
        property_id: m.get("property_id").and_then(Value::from_field),
        property_url: m.get("property_url").and_then(String::from_field),
        client_id: m.get("client_id").and_then(String::from_field),
        callback_url: m.get("callback_url").and_then(String::from_field),
    });

    let snapshot = match snapshot::build_snapshot(dc) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Snapshot construction failed, continuing without snapshot: {}", e);
            None
        }
    };

    DataCaptured {
        context: text("context"),
        status: text("status"),
        timestamp: text("timestamp"),
        summary,
        metadata,
        snapshot,
    }
}
