use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AmenityInput {
    pub name: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePropertyRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub price: Decimal,
    #[serde(rename = "type")]
    pub property_type: String,
    pub listing_type: Option<String>,
    #[serde(default)]
    pub bedrooms: i64,
    #[serde(default)]
    pub bathrooms: i64,
    #[serde(default)]
    pub area_sqft: i64,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub amenities: Vec<AmenityInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePropertyRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub price: Option<Decimal>,
    #[serde(rename = "type")]
    pub property_type: Option<String>,
    pub listing_type: Option<String>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<i64>,
    pub area_sqft: Option<i64>,
    pub is_featured: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct PropertyListItem {
    pub id: Uuid,
    pub title: String,
    pub location: String,
    pub price: Decimal,
    #[serde(rename = "type")]
    pub property_type: String,
    pub listing_type: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub area_sqft: i32,
    pub is_featured: bool,
    pub primary_image: Option<String>,
    pub favorites_count: i64,
    pub is_favorited: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct PropertyImageResponse {
    pub id: Uuid,
    pub image_url: Option<String>,
    pub order: i32,
}

#[derive(Debug, Serialize)]
pub struct AmenityResponse {
    pub id: Uuid,
    pub name: String,
    pub icon: String,
}

#[derive(Debug, Serialize)]
pub struct PropertyDetail {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub price: Decimal,
    #[serde(rename = "type")]
    pub property_type: String,
    pub listing_type: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub area_sqft: i32,
    pub is_featured: bool,
    pub images: Vec<PropertyImageResponse>,
    pub amenities: Vec<AmenityResponse>,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub is_mine: bool,
    pub favorites_count: i64,
    pub is_favorited: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub property: PropertyListItem,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct FavoriteToggleResponse {
    pub favorited: bool,
}
