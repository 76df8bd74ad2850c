//! Query-string filtering, free-text search and ordering for property lists.
//!
//! Parameters are parsed into a [`PropertyQuery`] first, so malformed values
//! are rejected before any SQL is built. Present constraints are ANDed; search
//! terms narrow the filtered set further.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};

use crate::error::{AppError, AppResult};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Case-insensitive exact match.
    PropertyType(String),
    /// Case-insensitive exact match.
    ListingType(String),
    PriceMin(Decimal),
    PriceMax(Decimal),
    Bedrooms(i32),
    BedroomsMin(i32),
    /// Case-insensitive substring.
    Location(String),
    Featured(bool),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyFilter {
    pub constraints: Vec<Constraint>,
    pub search_terms: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Price,
    CreatedAt,
    Bedrooms,
}

impl SortField {
    fn column(self) -> &'static str {
        match self {
            SortField::Price => "p.price",
            SortField::CreatedAt => "p.created_at",
            SortField::Bedrooms => "p.bedrooms",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyOrdering(pub Vec<SortKey>);

impl Default for PropertyOrdering {
    fn default() -> Self {
        PropertyOrdering(vec![SortKey {
            field: SortField::CreatedAt,
            descending: true,
        }])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyQuery {
    pub filter: PropertyFilter,
    pub ordering: PropertyOrdering,
    pub page: Page,
}

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_number<T: FromStr>(params: &HashMap<String, String>, key: &str) -> AppResult<Option<T>> {
    param(params, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| AppError::validation(format!("{}: Enter a number.", key)))
        })
        .transpose()
}

fn parse_bool(params: &HashMap<String, String>, key: &str) -> AppResult<Option<bool>> {
    param(params, key)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(AppError::validation(format!(
                "{}: Select a valid choice (true or false).",
                key
            ))),
        })
        .transpose()
}

impl PropertyFilter {
    pub fn from_params(params: &HashMap<String, String>) -> AppResult<Self> {
        let mut constraints = Vec::new();

        if let Some(v) = param(params, "type") {
            constraints.push(Constraint::PropertyType(v.to_string()));
        }
        if let Some(v) = param(params, "listing_type") {
            constraints.push(Constraint::ListingType(v.to_string()));
        }
        if let Some(v) = parse_number::<Decimal>(params, "price_min")? {
            constraints.push(Constraint::PriceMin(v));
        }
        if let Some(v) = parse_number::<Decimal>(params, "price_max")? {
            constraints.push(Constraint::PriceMax(v));
        }
        if let Some(v) = parse_number::<i32>(params, "bedrooms")? {
            constraints.push(Constraint::Bedrooms(v));
        }
        if let Some(v) = parse_number::<i32>(params, "bedrooms_min")? {
            constraints.push(Constraint::BedroomsMin(v));
        }
        if let Some(v) = param(params, "location") {
            constraints.push(Constraint::Location(v.to_string()));
        }
        if let Some(v) = parse_bool(params, "featured")? {
            constraints.push(Constraint::Featured(v));
        }

        let search_terms = param(params, "search")
            .map(|s| {
                s.split(|c: char| c.is_whitespace() || c == ',')
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            constraints,
            search_terms,
        })
    }

    /// Appends ` AND …` clauses; the builder must already be inside a WHERE.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for c in &self.constraints {
            match c {
                Constraint::PropertyType(v) => {
                    qb.push(" AND lower(p.property_type) = lower(");
                    qb.push_bind(v.clone());
                    qb.push(")");
                }
                Constraint::ListingType(v) => {
                    qb.push(" AND lower(p.listing_type) = lower(");
                    qb.push_bind(v.clone());
                    qb.push(")");
                }
                Constraint::PriceMin(v) => {
                    qb.push(" AND p.price >= ");
                    qb.push_bind(*v);
                }
                Constraint::PriceMax(v) => {
                    qb.push(" AND p.price <= ");
                    qb.push_bind(*v);
                }
                Constraint::Bedrooms(v) => {
                    qb.push(" AND p.bedrooms = ");
                    qb.push_bind(*v);
                }
                Constraint::BedroomsMin(v) => {
                    qb.push(" AND p.bedrooms >= ");
                    qb.push_bind(*v);
                }
                Constraint::Location(v) => {
                    qb.push(" AND p.location ILIKE ");
                    qb.push_bind(contains_pattern(v));
                }
                Constraint::Featured(v) => {
                    qb.push(" AND p.is_featured = ");
                    qb.push_bind(*v);
                }
            }
        }

        for term in &self.search_terms {
            let pattern = contains_pattern(term);
            qb.push(" AND (p.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR p.location ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR p.description ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
    }
}

/// `%term%` with LIKE wildcards in `term` matched literally.
pub fn contains_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

impl PropertyOrdering {
    /// `ordering=-price,bedrooms`. Unknown fields are dropped; if nothing is
    /// left the default (newest first) applies.
    pub fn parse(raw: Option<&str>) -> Self {
        let keys: Vec<SortKey> = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter_map(|item| {
                let (descending, name) = match item.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, item),
                };
                let field = match name {
                    "price" => SortField::Price,
                    "created_at" => SortField::CreatedAt,
                    "bedrooms" => SortField::Bedrooms,
                    _ => return None,
                };
                Some(SortKey { field, descending })
            })
            .collect();

        if keys.is_empty() {
            PropertyOrdering::default()
        } else {
            PropertyOrdering(keys)
        }
    }

    pub fn push_order(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" ORDER BY ");
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(key.field.column());
            qb.push(if key.descending { " DESC" } else { " ASC" });
        }
        qb.push(", p.id");
    }
}

impl Page {
    pub fn from_params(params: &HashMap<String, String>) -> AppResult<Self> {
        let limit = parse_number::<i64>(params, "limit")?.unwrap_or(DEFAULT_LIMIT);
        let offset = parse_number::<i64>(params, "offset")?.unwrap_or(0);
        if limit < 1 || offset < 0 {
            return Err(AppError::validation(
                "limit must be positive and offset must not be negative.",
            ));
        }
        Ok(Page {
            limit: limit.min(MAX_LIMIT),
            offset,
        })
    }

    pub fn push_limit(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" LIMIT ");
        qb.push_bind(self.limit);
        qb.push(" OFFSET ");
        qb.push_bind(self.offset);
    }
}

impl PropertyQuery {
    pub fn from_params(params: &HashMap<String, String>) -> AppResult<Self> {
        Ok(Self {
            filter: PropertyFilter::from_params(params)?,
            ordering: PropertyOrdering::parse(param(params, "ordering")),
            page: Page::from_params(params)?,
        })
    }

    /// Featured listings, optionally narrowed by `listing_type`, newest first.
    pub fn featured(params: &HashMap<String, String>) -> AppResult<Self> {
        let mut constraints = vec![Constraint::Featured(true)];
        if let Some(v) = param(params, "listing_type") {
            constraints.push(Constraint::ListingType(v.to_string()));
        }
        Ok(Self {
            filter: PropertyFilter {
                constraints,
                search_terms: Vec::new(),
            },
            ordering: PropertyOrdering::default(),
            page: Page::from_params(params)?,
        })
    }
}
