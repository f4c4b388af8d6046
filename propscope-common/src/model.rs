//! Analysis record model
//!
//! A [`NormalizedResult`] is the fixed-shape record produced by the normalizer
//! from an upstream workflow payload. The service's result store owns these
//! records; clients only ever receive read-only copies over HTTP.
//!
//! Top-level and key fields serialize in `snake_case`; the property snapshot
//! keeps the `camelCase` names the dashboard renders from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Identity of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisKey {
    /// Canonical identifier assigned by the workflow engine once processing begins
    pub super_id: Option<String>,
    /// Natural key before `super_id` exists
    pub property_url: Option<String>,
    /// When this variant of the record was received
    pub received_at: DateTime<Utc>,
}

/// Lifecycle state of one analysis
///
/// `Waiting -> Started -> Complete`, with `Error` and `Timeout` reachable
/// from any non-terminal state. Terminal states have no way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Waiting,
    Started,
    Complete,
    Error,
    Timeout,
}

impl AnalysisStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Timeout)
    }

    /// Whether a record in `self` may be overwritten by one in `next`.
    ///
    /// Redelivery of the same status is always accepted.
    pub fn can_transition_to(self, next: AnalysisStatus) -> bool {
        if self == next {
            return true;
        }
        match self {
            Self::Waiting => true,
            Self::Started => next != Self::Waiting,
            Self::Complete | Self::Error | Self::Timeout => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Started => "started",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// References to the floorplan analysis output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloorplanRefs {
    pub inline_csv: Option<String>,
    pub csv_url: Option<String>,
    pub total_area_csv_url: Option<String>,
    pub json_url: Option<String>,
    pub labelme_side_by_side_url: Option<String>,
}

impl FloorplanRefs {
    /// True when room data can be rendered: inline CSV text or a CSV URL.
    pub fn has_csv(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.inline_csv) || present(&self.csv_url)
    }

    pub fn is_empty(&self) -> bool {
        self == &FloorplanRefs::default()
    }
}

/// Progress counters reported by the capture step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub total_endpoints: Option<u64>,
    pub completed_endpoints: Option<u64>,
}

/// Request metadata echoed back by the capture step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    /// Numeric or string identifier, kept as sent
    pub property_id: Option<Value>,
    pub property_url: Option<String>,
    pub client_id: Option<String>,
    pub callback_url: Option<String>,
}

/// The data-capture part of a result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataCaptured {
    pub context: Option<String>,
    pub status: Option<String>,
    pub timestamp: Option<String>,
    pub summary: Option<CaptureSummary>,
    pub metadata: Option<CaptureMetadata>,
    pub snapshot: Option<Snapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPair {
    pub primary: Option<String>,
    pub secondary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub display_name: Option<String>,
    pub telephone: Option<String>,
    pub logo: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingLinks {
    pub property_url: Option<String>,
    pub school_checker_url: Option<String>,
    pub brochure_url: Option<String>,
    pub sold_prices_url: Option<String>,
    pub market_info_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub url: String,
    pub thumb: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorplanImage {
    pub url: String,
    pub thumb: Option<String>,
    pub caption: Option<String>,
}

/// Energy performance certificate image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpcImage {
    pub url: String,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub photos: Vec<Photo>,
    pub floorplans: Vec<FloorplanImage>,
    pub epcs: Vec<EpcImage>,
    pub map_preview_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingHtml {
    pub full_description: Option<String>,
    pub property_disclaimer: Option<String>,
    pub fees_apply_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub name: String,
    pub distance: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub name: String,
    pub distance: Option<f64>,
    pub rating_label: Option<String>,
}

/// Denormalized property facts
///
/// Every field is optional: the upstream listing source is inconsistent, so
/// each one is filled through a fallback chain in [`crate::normalize`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub transaction_type: Option<String>,
    pub channel: Option<String>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub size: TextPair,
    pub price: TextPair,
    pub address: Option<String>,
    pub postcode: Option<String>,
    pub agent: AgentInfo,
    pub links: ListingLinks,
    pub media: Media,
    pub location: GeoPoint,
    pub html: ListingHtml,
    pub stations: Vec<Station>,
    pub schools: Vec<School>,
    pub status_label: Option<String>,
    pub key_features: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}

/// The canonical analysis record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResult {
    pub key: AnalysisKey,
    pub analysis_status: AnalysisStatus,
    pub floorplan: FloorplanRefs,
    /// Opaque image-condition scores, passed through untouched
    pub image_condition: Option<Value>,
    pub data_captured: Option<DataCaptured>,
}

/// Why a record cannot be accepted as `complete`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incomplete {
    /// Neither `inline_csv` nor a CSV URL is present
    MissingFloorplanCsv,
}

impl std::fmt::Display for Incomplete {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFloorplanCsv => f.write_str(
                "Neither inline_csv nor csv_url found in floorplan data",
            ),
        }
    }
}

impl NormalizedResult {
    /// Record carrying only identity, used for started and error placeholders
    pub fn placeholder(
        super_id: Option<String>,
        property_url: Option<String>,
        status: AnalysisStatus,
        received_at: DateTime<Utc>,
    ) -> Self {
        let data_captured = property_url.as_ref().map(|url| DataCaptured {
            metadata: Some(CaptureMetadata {
                property_url: Some(url.clone()),
                ..Default::default()
            }),
            ..Default::default()
        });

        Self {
            key: AnalysisKey {
                super_id,
                property_url,
                received_at,
            },
            analysis_status: status,
            floorplan: FloorplanRefs::default(),
            image_condition: None,
            data_captured,
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.data_captured.as_ref().and_then(|dc| dc.snapshot.as_ref())
    }

    /// Check the `complete` invariant: floorplan room data must be reachable.
    pub fn check_complete(&self) -> Result<(), Incomplete> {
        if self.floorplan.has_csv() {
            Ok(())
        } else {
            Err(Incomplete::MissingFloorplanCsv)
        }
    }

    /// Merge this (incoming) record onto `existing`.
    ///
    /// Last write wins per top-level field; an absent incoming field keeps
    /// the existing value. Status and `received_at` always come from the
    /// incoming record.
    pub fn merged_onto(self, existing: &NormalizedResult) -> NormalizedResult {
        let floorplan = if self.floorplan.is_empty() {
            existing.floorplan.clone()
        } else {
            self.floorplan
        };

        NormalizedResult {
            key: AnalysisKey {
                super_id: self.key.super_id.or_else(|| existing.key.super_id.clone()),
                property_url: self
                    .key
                    .property_url
                    .or_else(|| existing.key.property_url.clone()),
                received_at: self.key.received_at,
            },
            analysis_status: self.analysis_status,
            floorplan,
            image_condition: self
                .image_condition
                .or_else(|| existing.image_condition.clone()),
            data_captured: self
                .data_captured
                .or_else(|| existing.data_captured.clone()),
        }
    }

    /// Lightweight list entry for the history sidebar
    pub fn summary(&self) -> HistorySummary {
        let snapshot = self.snapshot();
        let first_photo = snapshot.and_then(|s| s.media.photos.first());

        let address = snapshot
            .and_then(|s| s.address.clone().or_else(|| s.postcode.clone()))
            .or_else(|| self.key.property_url.clone())
            .unwrap_or_else(|| "Unknown Property".to_string());

        HistorySummary {
            super_id: self.key.super_id.clone(),
            property_url: self.key.property_url.clone(),
            received_at: self.key.received_at,
            analysis_status: self.analysis_status,
            address,
            price: snapshot.and_then(|s| s.price.primary.clone()),
            thumbnail: first_photo.map(|p| p.thumb.clone().unwrap_or_else(|| p.url.clone())),
            bedrooms: snapshot.and_then(|s| s.bedrooms),
            bathrooms: snapshot.and_then(|s| s.bathrooms),
        }
    }

    /// Re-encode this record in the raw workflow envelope shape.
    ///
    /// Feeding the output back through [`crate::normalize::normalize`] yields
    /// the same record.
    pub fn to_envelope(&self) -> Value {
        let floorplan = &self.floorplan;
        let mut final_result = json!({
            "floorplan_data": {
                "inline_csv": floorplan.inline_csv,
                "fp_json_csv_url": floorplan.csv_url,
                "total_area_csv_url": floorplan.total_area_csv_url,
                "fp_json_file_url": floorplan.json_url,
                "image_labelme_side_by_side_url": floorplan.labelme_side_by_side_url,
            },
            "image_condition_data": {
                "ica_overall_analysis": self.image_condition,
            },
        });

        if let Some(dc) = &self.data_captured {
            let results: Vec<Value> = dc
                .snapshot
                .iter()
                .map(|snapshot| json!({ "raw_data": { "data": snapshot } }))
                .collect();
            final_result["data_captured"] = json!({
                "super_id": self.key.super_id,
                "context": dc.context,
                "status": dc.status,
                "timestamp": dc.timestamp,
                "summary": dc.summary,
                "metadata": dc.metadata,
                "data": {
                    "property_url": self.key.property_url,
                    "results": results,
                },
            });
        }

        json!({
            "super_id": self.key.super_id,
            "property_url": self.key.property_url,
            "final_result": final_result,
        })
    }
}

/// History sidebar entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub super_id: Option<String>,
    pub property_url: Option<String>,
    pub received_at: DateTime<Utc>,
    pub analysis_status: AnalysisStatus,
    pub address: String,
    pub price: Option<String>,
    pub thumbnail: Option<String>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
}
