use rust_decimal::Decimal;
use uuid::Uuid;

use super::dto::{
    AmenityResponse, CreatePropertyRequest, FavoriteResponse, PropertyDetail,
    PropertyImageResponse, PropertyListItem, UpdatePropertyRequest,
};
use super::repo_types::{
    FavoriteRow, ListingType, NewProperty, PropertyChanges, PropertyDetailRow, PropertyImage,
    PropertySummary, PropertyType,
};
use crate::{
    authz::can_write,
    error::{AppError, AppResult},
    media::MediaLinks,
};

/// NUMERIC(14, 2)
const MAX_PRICE_DIGITS: u32 = 12;

fn validate_price(price: Decimal) -> AppResult<Decimal> {
    if price.is_sign_negative() {
        return Err(AppError::validation("price: Ensure this value is not negative."));
    }
    if price.scale() > 2 {
        return Err(AppError::validation(
            "price: Ensure that there are no more than 2 decimal places.",
        ));
    }
    if price.trunc() >= Decimal::from(10_i64.pow(MAX_PRICE_DIGITS)) {
        return Err(AppError::validation(
            "price: Ensure that there are no more than 12 digits before the decimal point.",
        ));
    }
    Ok(price)
}

fn validate_count(field: &str, value: i64) -> AppResult<i32> {
    if value < 0 {
        return Err(AppError::validation(format!(
            "{}: Ensure this value is greater than or equal to 0.",
            field
        )));
    }
    i32::try_from(value)
        .map_err(|_| AppError::validation(format!("{}: Ensure this value is smaller.", field)))
}

fn required_text(field: &str, value: String) -> AppResult<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(AppError::validation(format!("{}: This field may not be blank.", field)));
    }
    Ok(value)
}

fn parse_type(raw: &str) -> AppResult<PropertyType> {
    raw.parse::<PropertyType>()
        .map_err(|e| AppError::validation(format!("type: {}", e)))
}

fn parse_listing_type(raw: &str) -> AppResult<ListingType> {
    raw.parse::<ListingType>()
        .map_err(|e| AppError::validation(format!("listing_type: {}", e)))
}

pub fn new_property(req: CreatePropertyRequest) -> AppResult<NewProperty> {
    let amenities = req
        .amenities
        .into_iter()
        .map(|a| Ok((required_text("amenities.name", a.name)?, a.icon.trim().to_string())))
        .collect::<AppResult<Vec<_>>>()?;

    Ok(NewProperty {
        title: required_text("title", req.title)?,
        description: req.description,
        location: required_text("location", req.location)?,
        price: validate_price(req.price)?,
        property_type: parse_type(&req.property_type)?,
        listing_type: req
            .listing_type
            .as_deref()
            .map(parse_listing_type)
            .transpose()?
            .unwrap_or_default(),
        bedrooms: validate_count("bedrooms", req.bedrooms)?,
        bathrooms: validate_count("bathrooms", req.bathrooms)?,
        area_sqft: validate_count("area_sqft", req.area_sqft)?,
        is_featured: req.is_featured,
        amenities,
    })
}

pub fn property_changes(req: UpdatePropertyRequest) -> AppResult<PropertyChanges> {
    Ok(PropertyChanges {
        title: req.title.map(|v| required_text("title", v)).transpose()?,
        description: req.description,
        location: req.location.map(|v| required_text("location", v)).transpose()?,
        price: req.price.map(validate_price).transpose()?,
        property_type: req.property_type.as_deref().map(parse_type).transpose()?,
        listing_type: req
            .listing_type
            .as_deref()
            .map(parse_listing_type)
            .transpose()?,
        bedrooms: req.bedrooms.map(|v| validate_count("bedrooms", v)).transpose()?,
        bathrooms: req.bathrooms.map(|v| validate_count("bathrooms", v)).transpose()?,
        area_sqft: req.area_sqft.map(|v| validate_count("area_sqft", v)).transpose()?,
        is_featured: req.is_featured,
    })
}

pub fn list_item(row: PropertySummary, links: &MediaLinks) -> PropertyListItem {
    PropertyListItem {
        primary_image: links.resolve(row.primary_image_key.as_deref()),
        id: row.id,
        title: row.title,
        location: row.location,
        price: row.price,
        property_type: row.property_type,
        listing_type: row.listing_type,
        bedrooms: row.bedrooms,
        bathrooms: row.bathrooms,
        area_sqft: row.area_sqft,
        is_featured: row.is_featured,
        favorites_count: row.favorites_count,
        is_favorited: row.is_favorited,
        created_at: row.created_at,
    }
}

pub fn favorite(row: FavoriteRow, links: &MediaLinks) -> FavoriteResponse {
    FavoriteResponse {
        created_at: row.favorited_at,
        property: list_item(row.property, links),
    }
}

pub fn image(img: PropertyImage, links: &MediaLinks) -> PropertyImageResponse {
    PropertyImageResponse {
        image_url: links.resolve(Some(&img.image_key)),
        id: img.id,
        order: img.order_index,
    }
}

pub fn detail(row: PropertyDetailRow, viewer: Option<Uuid>, links: &MediaLinks) -> PropertyDetail {
    let is_mine = can_write(viewer, &row.property);
    let p = row.property;
    PropertyDetail {
        id: p.id,
        title: p.title,
        description: p.description,
        location: p.location,
        price: p.price,
        property_type: p.property_type,
        listing_type: p.listing_type,
        bedrooms: p.bedrooms,
        bathrooms: p.bathrooms,
        area_sqft: p.area_sqft,
        is_featured: p.is_featured,
        images: row.images.into_iter().map(|i| image(i, links)).collect(),
        amenities: row
            .amenities
            .into_iter()
            .map(|a| AmenityResponse {
                id: a.id,
                name: a.name,
                icon: a.icon,
            })
            .collect(),
        owner_id: p.owner_id,
        owner_name: row.owner_name,
        is_mine,
        favorites_count: row.favorites_count,
        is_favorited: row.is_favorited,
        created_at: p.created_at,
        updated_at: p.updated_at,
    }
}
