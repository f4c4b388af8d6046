//! Property snapshot extraction
//!
//! Accepts both the raw listing-portal record shape and the already
//! normalized [`Snapshot`] shape, so a record's own re-encoding normalizes
//! back to itself.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use super::chain::{first_array, info_reel_text, Accessor, Chain, FromField};
use crate::model::{
    AgentInfo, EpcImage, FloorplanImage, GeoPoint, ListingHtml, ListingLinks, Media, Photo,
    School, Snapshot, Station, TextPair,
};

/// UK postcode, e.g. `N7 7JP` or `TW9 2PQ`
static POSTCODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[A-Z]{1,2}\d[\dA-Z]?\s*\d[A-Z]{2}\b").expect("postcode pattern is valid")
});

/// Snapshot construction failures; the caller degrades these to no snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("{0} is not an array")]
    NotAnArray(&'static str),
}

/// Pick the preferred raw listing record from a `data_captured` object.
///
/// The first candidate carrying any signal field wins; otherwise the first
/// candidate.
pub fn preferred_candidate(data_captured: &Value) -> Result<Option<&Value>, SnapshotError> {
    let results = match data_captured.pointer("/data/results") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(SnapshotError::NotAnArray("data_captured.data.results")),
    };

    let candidates: Vec<&Value> = results
        .iter()
        .filter_map(|r| r.pointer("/raw_data/data"))
        .filter(|d| d.is_object())
        .collect();

    let has_signal = |d: &&Value| {
        ["transactionType", "text", "price"]
            .iter()
            .any(|k| d.get(k).is_some_and(|v| !v.is_null()))
    };

    Ok(candidates
        .iter()
        .copied()
        .find(has_signal)
        .or_else(|| candidates.first().copied()))
}

/// Build the snapshot for a `data_captured` object
pub fn build_snapshot(data_captured: &Value) -> Result<Option<Snapshot>, SnapshotError> {
    Ok(preferred_candidate(data_captured)?.map(snapshot_from))
}

fn bedrooms_from_info_reel(v: &Value) -> Option<u32> {
    info_reel_text(v, "BEDROOMS", "primaryText").and_then(|t| u32::from_field(&Value::String(t)))
}

fn bathrooms_from_info_reel(v: &Value) -> Option<u32> {
    info_reel_text(v, "BATHROOMS", "primaryText").and_then(|t| u32::from_field(&Value::String(t)))
}

fn size_from_sizings(v: &Value) -> Option<String> {
    v.get("sizings")?
        .as_array()?
        .iter()
        .find(|s| s.get("unit").and_then(Value::as_str) == Some("sqft"))
        .and_then(|s| s.get("minimumSize"))
        .and_then(String::from_field)
        .map(|n| format!("{n} sq ft"))
}

fn size_from_info_reel(v: &Value) -> Option<String> {
    info_reel_text(v, "SIZE", "primaryText")
}

fn size_secondary_from_info_reel(v: &Value) -> Option<String> {
    info_reel_text(v, "SIZE", "secondaryText")
}

const TRANSACTION_TYPE: Chain<String> =
    Chain::new("transactionType", &[Accessor::Path("/transactionType")]);
const CHANNEL: Chain<String> = Chain::new("channel", &[Accessor::Path("/channel")]);
const BEDROOMS: Chain<u32> = Chain::new(
    "bedrooms",
    &[Accessor::Path("/bedrooms"), Accessor::Derive(bedrooms_from_info_reel)],
);
const BATHROOMS: Chain<u32> = Chain::new(
    "bathrooms",
    &[Accessor::Path("/bathrooms"), Accessor::Derive(bathrooms_from_info_reel)],
);
const SIZE_PRIMARY: Chain<String> = Chain::new(
    "size.primary",
    &[
        Accessor::Path("/size/primary"),
        Accessor::Derive(size_from_sizings),
        Accessor::Derive(size_from_info_reel),
    ],
);
const SIZE_SECONDARY: Chain<String> = Chain::new(
    "size.secondary",
    &[
        Accessor::Path("/size/secondary"),
        Accessor::Derive(size_secondary_from_info_reel),
    ],
);
const PRICE_PRIMARY: Chain<String> = Chain::new(
    "price.primary",
    &[
        Accessor::Path("/price/primary"),
        Accessor::Path("/prices/primaryPrice"),
    ],
);
const PRICE_SECONDARY: Chain<String> = Chain::new(
    "price.secondary",
    &[
        Accessor::Path("/price/secondary"),
        Accessor::Path("/prices/secondaryPrice"),
    ],
);
const ADDRESS: Chain<String> = Chain::new(
    "address",
    &[
        Accessor::Path("/address"),
        Accessor::Path("/displayAddress"),
        Accessor::Path("/address/displayAddress"),
        Accessor::Path("/text/pageTitle"),
    ],
);
const POSTCODE_FIELD: Chain<String> = Chain::new("postcode", &[Accessor::Path("/postcode")]);
const AGENT_NAME: Chain<String> = Chain::new(
    "agent.displayName",
    &[
        Accessor::Path("/branch/displayName"),
        Accessor::Path("/customer/branchDisplayName"),
        Accessor::Path("/agent/displayName"),
    ],
);
const AGENT_TELEPHONE: Chain<String> = Chain::new(
    "agent.telephone",
    &[
        Accessor::Path("/telephoneNumber"),
        Accessor::Path("/contactInfo/telephoneNumbers/localNumber"),
        Accessor::Path("/agent/telephone"),
    ],
);
const AGENT_LOGO: Chain<String> = Chain::new(
    "agent.logo",
    &[
        Accessor::Path("/branch/logo"),
        Accessor::Path("/customer/logoPath"),
        Accessor::Path("/agent/logo"),
    ],
);
const AGENT_ADDRESS: Chain<String> = Chain::new(
    "agent.address",
    &[
        Accessor::Path("/branch/address"),
        Accessor::Path("/customer/displayAddress"),
        Accessor::Path("/agent/address"),
    ],
);
const LINK_PROPERTY: Chain<String> = Chain::new(
    "links.propertyUrl",
    &[
        Accessor::Path("/propertyUrl"),
        Accessor::Path("/propertyUrls/similarPropertiesUrl"),
        Accessor::Path("/links/propertyUrl"),
    ],
);
const LINK_SCHOOL_CHECKER: Chain<String> = Chain::new(
    "links.schoolCheckerUrl",
    &[
        Accessor::Path("/schoolCheckerUrl"),
        Accessor::Path("/links/schoolCheckerUrl"),
    ],
);
const LINK_BROCHURE: Chain<String> = Chain::new(
    "links.brochureUrl",
    &[
        Accessor::Path("/brochure/brochures/0/url"),
        Accessor::Path("/brochures/0/url"),
        Accessor::Path("/links/brochureUrl"),
    ],
);
const LINK_SOLD_PRICES: Chain<String> = Chain::new(
    "links.soldPricesUrl",
    &[
        Accessor::Path("/soldPricesUrl"),
        Accessor::Path("/propertyUrls/nearbySoldPropertiesUrl"),
        Accessor::Path("/links/soldPricesUrl"),
    ],
);
const LINK_MARKET_INFO: Chain<String> = Chain::new(
    "links.marketInfoUrl",
    &[
        Accessor::Path("/marketInfoUrl"),
        Accessor::Path("/links/marketInfoUrl"),
    ],
);
const MAP_PREVIEW: Chain<String> = Chain::new(
    "media.mapPreviewUrl",
    &[
        Accessor::Path("/location/mapPreviewUrl"),
        Accessor::Path("/staticMapImgUrls/staticMapImgUrlDesktopLarge"),
        Accessor::Path("/media/mapPreviewUrl"),
    ],
);
const LATITUDE: Chain<f64> = Chain::new(
    "location.latitude",
    &[
        Accessor::Path("/location/latitude"),
        Accessor::Path("/streetView/latitude"),
    ],
);
const LONGITUDE: Chain<f64> = Chain::new(
    "location.longitude",
    &[
        Accessor::Path("/location/longitude"),
        Accessor::Path("/streetView/longitude"),
    ],
);
const FULL_DESCRIPTION: Chain<String> = Chain::new(
    "html.fullDescription",
    &[
        Accessor::Path("/fullDescription"),
        Accessor::Path("/text/description"),
        Accessor::Path("/html/fullDescription"),
    ],
);
const DISCLAIMER: Chain<String> = Chain::new(
    "html.propertyDisclaimer",
    &[
        Accessor::Path("/propertyDisclaimer"),
        Accessor::Path("/text/disclaimer"),
        Accessor::Path("/html/propertyDisclaimer"),
    ],
);
const FEES_APPLY: Chain<String> = Chain::new(
    "html.feesApplyText",
    &[
        Accessor::Path("/lettingsInfo/lettingFeesMessage"),
        Accessor::Path("/feesApply/feesApplyText"),
        Accessor::Path("/html/feesApplyText"),
    ],
);
const STATUS_LABEL: Chain<String> = Chain::new(
    "statusLabel",
    &[Accessor::Path("/status/label"), Accessor::Path("/statusLabel")],
);
const KEY_FEATURES: Chain<Vec<String>> =
    Chain::new("keyFeatures", &[Accessor::Path("/keyFeatures")]);
const TAGS: Chain<Vec<String>> = Chain::new("tags", &[Accessor::Path("/tags")]);

// Per-item chains for media and nearby places
const PHOTO_URL: Chain<String> =
    Chain::new("photo.url", &[Accessor::Path("/maxSizeUrl"), Accessor::Path("/url")]);
const PHOTO_THUMB: Chain<String> = Chain::new(
    "photo.thumb",
    &[
        Accessor::Path("/thumbnailUrl"),
        Accessor::Path("/resizedImageUrls/size135x100"),
        Accessor::Path("/thumb"),
    ],
);
const FLOORPLAN_THUMB: Chain<String> = Chain::new(
    "floorplan.thumb",
    &[
        Accessor::Path("/thumbnailUrl"),
        Accessor::Path("/resizedFloorplanUrls/size296x197"),
        Accessor::Path("/thumb"),
    ],
);
const URL: Chain<String> = Chain::new("url", &[Accessor::Path("/url")]);
const CAPTION: Chain<String> = Chain::new("caption", &[Accessor::Path("/caption")]);
const PLACE_NAME: Chain<String> =
    Chain::new("place.name", &[Accessor::Path("/station"), Accessor::Path("/name")]);
const DISTANCE: Chain<f64> = Chain::new("distance", &[Accessor::Path("/distance")]);
const UNIT: Chain<String> = Chain::new("unit", &[Accessor::Path("/unit")]);
const RATING_LABEL: Chain<String> = Chain::new("ratingLabel", &[Accessor::Path("/ratingLabel")]);

fn snapshot_from(pref: &Value) -> Snapshot {
    let address = ADDRESS.resolve(pref);
    let postcode = POSTCODE_FIELD
        .resolve(pref)
        .or_else(|| address.as_deref().and_then(find_postcode));

    Snapshot {
        transaction_type: TRANSACTION_TYPE.resolve(pref),
        channel: CHANNEL.resolve(pref),
        bedrooms: BEDROOMS.resolve(pref),
        bathrooms: BATHROOMS.resolve(pref),
        size: TextPair {
            primary: SIZE_PRIMARY.resolve(pref),
            secondary: SIZE_SECONDARY.resolve(pref),
        },
        price: TextPair {
            primary: PRICE_PRIMARY.resolve(pref),
            secondary: PRICE_SECONDARY.resolve(pref),
        },
        address,
        postcode,
        agent: AgentInfo {
            display_name: AGENT_NAME.resolve(pref),
            telephone: AGENT_TELEPHONE.resolve(pref),
            logo: AGENT_LOGO.resolve(pref),
            address: AGENT_ADDRESS.resolve(pref),
        },
        links: ListingLinks {
            property_url: LINK_PROPERTY.resolve(pref),
            school_checker_url: LINK_SCHOOL_CHECKER.resolve(pref),
            brochure_url: LINK_BROCHURE.resolve(pref),
            sold_prices_url: LINK_SOLD_PRICES.resolve(pref),
            market_info_url: LINK_MARKET_INFO.resolve(pref),
        },
        media: Media {
            photos: photos(pref),
            floorplans: floorplan_images(pref),
            epcs: epcs(pref),
            map_preview_url: MAP_PREVIEW.resolve(pref),
        },
        location: GeoPoint {
            latitude: LATITUDE.resolve(pref),
            longitude: LONGITUDE.resolve(pref),
        },
        html: ListingHtml {
            full_description: FULL_DESCRIPTION.resolve(pref),
            property_disclaimer: DISCLAIMER.resolve(pref),
            fees_apply_text: FEES_APPLY.resolve(pref),
        },
        stations: stations(pref),
        schools: schools(pref),
        status_label: STATUS_LABEL.resolve(pref),
        key_features: KEY_FEATURES.resolve(pref),
        tags: TAGS.resolve(pref),
    }
}

pub fn find_postcode(text: &str) -> Option<String> {
    POSTCODE.find(text).map(|m| m.as_str().to_uppercase())
}

fn photos(pref: &Value) -> Vec<Photo> {
    first_array(pref, &["/photos", "/images", "/media/photos"])
        .iter()
        .filter_map(|p| {
            Some(Photo {
                url: PHOTO_URL.resolve(p)?,
                thumb: PHOTO_THUMB.resolve(p),
            })
        })
        .collect()
}

fn floorplan_images(pref: &Value) -> Vec<FloorplanImage> {
    first_array(pref, &["/floorplans", "/media/floorplans"])
        .iter()
        .filter_map(|f| {
            Some(FloorplanImage {
                url: URL.resolve(f)?,
                thumb: FLOORPLAN_THUMB.resolve(f),
                caption: CAPTION.resolve(f),
            })
        })
        .collect()
}

fn epcs(pref: &Value) -> Vec<EpcImage> {
    first_array(pref, &["/epcs", "/epcGraphs", "/media/epcs"])
        .iter()
        .filter_map(|e| {
            Some(EpcImage {
                url: URL.resolve(e)?,
                caption: CAPTION.resolve(e),
            })
        })
        .collect()
}

fn stations(pref: &Value) -> Vec<Station> {
    first_array(pref, &["/stations", "/nearestStations"])
        .iter()
        .filter_map(|s| {
            Some(Station {
                name: PLACE_NAME.resolve(s)?,
                distance: DISTANCE.resolve(s),
                unit: UNIT.resolve(s),
            })
        })
        .collect()
}

fn schools(pref: &Value) -> Vec<School> {
    first_array(pref, &["/nearestSchools", "/schools"])
        .iter()
        .filter_map(|s| {
            Some(School {
                name: PLACE_NAME.resolve(s)?,
                distance: DISTANCE.resolve(s),
                rating_label: RATING_LABEL.resolve(s),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn captured(records: Vec<Value>) -> Value {
        let results: Vec<Value> = records
            .into_iter()
            .map(|data| json!({"raw_data": {"data": data}}))
            .collect();
        json!({"data": {"results": results}})
    }

    #[test]
    fn test_prefers_candidate_with_signal_field() {
        let dc = captured(vec![
            json!({"id": 1}),
            json!({"id": 2, "transactionType": "RENT"}),
        ]);
        let pref = preferred_candidate(&dc).unwrap().unwrap();
        assert_eq!(pref["id"], 2);
    }

    #[test]
    fn test_falls_back_to_first_candidate() {
        let dc = captured(vec![json!({"id": 1}), json!({"id": 2})]);
        assert_eq!(preferred_candidate(&dc).unwrap().unwrap()["id"], 1);
    }

    #[test]
    fn test_missing_results_is_no_snapshot() {
        assert!(build_snapshot(&json!({})).unwrap().is_none());
        assert!(build_snapshot(&captured(vec![])).unwrap().is_none());
    }

    #[test]
    fn test_malformed_results_is_an_error() {
        let dc = json!({"data": {"results": "oops"}});
        assert!(matches!(build_snapshot(&dc), Err(SnapshotError::NotAnArray(_))));
    }

    #[test]
    fn test_info_reel_and_sizings_fallbacks() {
        let dc = captured(vec![json!({
            "text": {"pageTitle": "Isledon Road, N7 7LP"},
            "prices": {"primaryPrice": "£1,600 pcm", "secondaryPrice": "£369 pw"},
            "sizings": [{"unit": "sqm", "minimumSize": 34}, {"unit": "sqft", "minimumSize": 370}],
            "infoReelItems": [
                {"type": "BEDROOMS", "primaryText": "1"},
                {"type": "BATHROOMS", "primaryText": "1"},
                {"type": "SIZE", "primaryText": "370 sq ft", "secondaryText": "34 sq m"}
            ]
        })]);

        let snap = build_snapshot(&dc).unwrap().unwrap();
        assert_eq!(snap.address.as_deref(), Some("Isledon Road, N7 7LP"));
        assert_eq!(snap.postcode.as_deref(), Some("N7 7LP"));
        assert_eq!(snap.price.primary.as_deref(), Some("£1,600 pcm"));
        assert_eq!(snap.price.secondary.as_deref(), Some("£369 pw"));
        assert_eq!(snap.size.primary.as_deref(), Some("370 sq ft"));
        assert_eq!(snap.size.secondary.as_deref(), Some("34 sq m"));
        assert_eq!(snap.bedrooms, Some(1));
        assert_eq!(snap.bathrooms, Some(1));
    }

    #[test]
    fn test_media_items_without_url_are_dropped() {
        let dc = captured(vec![json!({
            "price": {"primary": "£425,000"},
            "images": [
                {"url": "https://img/1.jpg", "resizedImageUrls": {"size135x100": "https://img/1_t.jpg"}},
                {"caption": "no url"}
            ],
            "floorplans": [{"url": "https://img/fp.png", "caption": "Ground Floor"}],
            "epcGraphs": [{"url": "https://img/epc.png"}],
            "nearestStations": [{"name": "Arsenal", "distance": 0.2, "unit": "miles"}, {"distance": 1}],
            "nearestSchools": [{"name": "Park Academy", "distance": 0.3, "ratingLabel": "Good"}]
        })]);

        let snap = build_snapshot(&dc).unwrap().unwrap();
        assert_eq!(snap.media.photos.len(), 1);
        assert_eq!(snap.media.photos[0].thumb.as_deref(), Some("https://img/1_t.jpg"));
        assert_eq!(snap.media.floorplans[0].caption.as_deref(), Some("Ground Floor"));
        assert_eq!(snap.media.epcs.len(), 1);
        assert_eq!(snap.stations.len(), 1);
        assert_eq!(snap.stations[0].distance, Some(0.2));
        assert_eq!(snap.schools[0].rating_label.as_deref(), Some("Good"));
    }

    #[test]
    fn test_find_postcode() {
        assert_eq!(find_postcode("42 Maple Avenue, Richmond TW9 2PQ").as_deref(), Some("TW9 2PQ"));
        assert_eq!(find_postcode("flat in n77jp").as_deref(), Some("N77JP"));
        assert_eq!(find_postcode("No postcode here"), None);
    }
}
