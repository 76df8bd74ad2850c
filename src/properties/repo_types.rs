use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::authz::Owned;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    House,
    Apartment,
    Villa,
    Office,
}

impl PropertyType {
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyType::House => "House",
            PropertyType::Apartment => "Apartment",
            PropertyType::Villa => "Villa",
            PropertyType::Office => "Office",
        }
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "House" => Ok(PropertyType::House),
            "Apartment" => Ok(PropertyType::Apartment),
            "Villa" => Ok(PropertyType::Villa),
            "Office" => Ok(PropertyType::Office),
            other => Err(format!("\"{}\" is not a valid property type.", other)),
        }
    }
}

/// Sale, rental or new-launch; independent of the structural type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingType {
    #[default]
    Buy,
    Rent,
    NewLaunch,
}

impl ListingType {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingType::Buy => "buy",
            ListingType::Rent => "rent",
            ListingType::NewLaunch => "new_launch",
        }
    }
}

impl FromStr for ListingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(ListingType::Buy),
            "rent" => Ok(ListingType::Rent),
            "new_launch" => Ok(ListingType::NewLaunch),
            other => Err(format!("\"{}\" is not a valid listing type.", other)),
        }
    }
}

/// Property row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct Property {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub price: Decimal,
    pub property_type: String,
    pub listing_type: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub area_sqft: i32,
    pub is_featured: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Owned for Property {
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

/// A list row: the property plus everything computed for the viewer.
#[derive(Debug, Clone, FromRow)]
pub struct PropertySummary {
    pub id: Uuid,
    pub title: String,
    pub location: String,
    pub price: Decimal,
    pub property_type: String,
    pub listing_type: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub area_sqft: i32,
    pub is_featured: bool,
    pub created_at: OffsetDateTime,
    pub primary_image_key: Option<String>,
    pub favorites_count: i64,
    pub is_favorited: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct FavoriteRow {
    #[sqlx(flatten)]
    pub property: PropertySummary,
    pub favorited_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct PropertyImage {
    pub id: Uuid,
    pub image_key: String,
    pub order_index: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct Amenity {
    pub id: Uuid,
    pub name: String,
    pub icon: String,
}

/// Everything the detail view shows.
#[derive(Debug, Clone)]
pub struct PropertyDetailRow {
    pub property: Property,
    pub owner_name: String,
    pub images: Vec<PropertyImage>,
    pub amenities: Vec<Amenity>,
    pub favorites_count: i64,
    pub is_favorited: bool,
}

#[derive(Debug, Clone)]
pub struct NewProperty {
    pub title: String,
    pub description: String,
    pub location: String,
    pub price: Decimal,
    pub property_type: PropertyType,
    pub listing_type: ListingType,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub area_sqft: i32,
    pub is_featured: bool,
    pub amenities: Vec<(String, String)>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct PropertyChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub price: Option<Decimal>,
    pub property_type: Option<PropertyType>,
    pub listing_type: Option<ListingType>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub area_sqft: Option<i32>,
    pub is_featured: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_type_is_case_sensitive_on_write() {
        assert_eq!("Villa".parse::<PropertyType>(), Ok(PropertyType::Villa));
        assert!("villa".parse::<PropertyType>().is_err());
    }

    #[test]
    fn listing_type_wire_names() {
        let lt: ListingType = "new_launch".parse().unwrap();
        assert_eq!(lt, ListingType::NewLaunch);
        assert_eq!(lt.as_str(), "new_launch");
        assert_eq!(ListingType::default(), ListingType::Buy);
    }
}
