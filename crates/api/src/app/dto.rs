//! Query/body DTOs and their mapping to domain inputs.
//!
//! Bodies are taken as raw JSON and decoded here so that a malformed payload
//! gets the same `{"error","message"}` shape as every other 400.

use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use stockroom_core::{DomainError, Pagination};
use stockroom_infra::catalog::ProductFilter;
use stockroom_infra::stock::MovementFilter;
use stockroom_inventory::{DayWindow, MovementType};

use crate::app::errors;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub search: Option<String>,
    pub category_id: Option<String>,
    pub supplier_id: Option<String>,
    pub low_stock_only: Option<bool>,
}

impl ProductListQuery {
    pub fn into_parts(self) -> Result<(ProductFilter, Pagination), Response> {
        let filter = ProductFilter {
            search: self.search,
            category_id: parse_optional_id(self.category_id.as_deref())?,
            supplier_id: parse_optional_id(self.supplier_id.as_deref())?,
            low_stock_only: self.low_stock_only.unwrap_or(false),
        };
        Ok((filter, Pagination::new(self.limit, self.offset)))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (local calendar day).
    pub from: Option<String>,
    pub to: Option<String>,
    pub product_id: Option<String>,
    #[serde(rename = "type")]
    pub movement_type: Option<String>,
}

impl MovementListQuery {
    pub fn into_parts(
        self,
        now: DateTime<FixedOffset>,
    ) -> Result<(MovementFilter, Pagination), Response> {
        let movement_type = match self.movement_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(MovementType::from_str(raw).map_err(bad_request)?),
        };
        let filter = MovementFilter {
            product_id: parse_optional_id(self.product_id.as_deref())?,
            movement_type,
            from: parse_bound(self.from.as_deref(), Bound::Start, now)?,
            to: parse_bound(self.to.as_deref(), Bound::End, now)?,
        };
        Ok((filter, Pagination::new(self.limit, self.offset)))
    }
}

/// Optional `{ "reason": ... }` body for deactivate/reactivate.
#[derive(Debug, Default, Deserialize)]
pub struct ReasonBody {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

fn parse_bound(
    raw: Option<&str>,
    bound: Bound,
    now: DateTime<FixedOffset>,
) -> Result<Option<DateTime<Utc>>, Response> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("'{raw}' is neither an RFC 3339 timestamp nor a YYYY-MM-DD date"),
        )
    })?;
    let day = DayWindow::for_date(date, *now.offset());
    Ok(Some(match bound {
        Bound::Start => day.start,
        // Filter bounds are inclusive; stop just before the next day starts.
        Bound::End => day.end - Duration::nanoseconds(1),
    }))
}

pub fn parse_id<T>(raw: &str) -> Result<T, Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(|e: DomainError| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string())
    })
}

fn parse_optional_id<T>(raw: Option<&str>) -> Result<Option<T>, Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_id)
        .transpose()
}

/// Decode an extracted JSON body into a domain payload.
///
/// Extraction failures (bad syntax, wrong content type) and shape mismatches
/// both answer 400 `validation_error`.
pub fn decode<T: DeserializeOwned>(
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<T, Response> {
    let Json(value) = body.map_err(|rejection| bad_request(rejection.body_text()))?;
    decode_value(value)
}

pub fn decode_value<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, Response> {
    serde_json::from_value(value).map_err(bad_request)
}

fn bad_request(e: impl std::fmt::Display) -> Response {
    errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
}
