use anyhow::Context;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::filter::{Page, PropertyQuery};
use super::repo_types::{
    Amenity, FavoriteRow, NewProperty, Property, PropertyChanges, PropertyDetailRow,
    PropertyImage, PropertySummary,
};
use crate::auth::repo_types::display_name;

const PROPERTY_COLUMNS: &str = "id, owner_id, title, description, location, price, property_type, \
     listing_type, bedrooms, bathrooms, area_sqft, is_featured, created_at, updated_at";

/// Starts a summary SELECT; the viewer id is bound for `is_favorited`.
fn summary_select(viewer: Option<Uuid>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        r#"
        SELECT p.id, p.title, p.location, p.price, p.property_type, p.listing_type,
               p.bedrooms, p.bathrooms, p.area_sqft, p.is_featured, p.created_at,
               (SELECT i.image_key FROM property_images i
                 WHERE i.property_id = p.id
                 ORDER BY i.order_index, i.id LIMIT 1) AS primary_image_key,
               (SELECT COUNT(*) FROM favorites f WHERE f.property_id = p.id) AS favorites_count,
               EXISTS (SELECT 1 FROM favorites f
                        WHERE f.property_id = p.id AND f.user_id = "#,
    );
    qb.push_bind(viewer);
    qb.push(") AS is_favorited");
    qb
}

pub fn list_query(query: &PropertyQuery, viewer: Option<Uuid>) -> QueryBuilder<'static, Postgres> {
    let mut qb = summary_select(viewer);
    qb.push(" FROM properties p WHERE TRUE");
    query.filter.push_where(&mut qb);
    query.ordering.push_order(&mut qb);
    query.page.push_limit(&mut qb);
    qb
}

pub async fn list(
    db: &PgPool,
    query: &PropertyQuery,
    viewer: Option<Uuid>,
) -> sqlx::Result<Vec<PropertySummary>> {
    list_query(query, viewer)
        .build_query_as::<PropertySummary>()
        .fetch_all(db)
        .await
}

pub async fn list_favorites(
    db: &PgPool,
    user_id: Uuid,
    page: Page,
) -> sqlx::Result<Vec<FavoriteRow>> {
    let mut qb = summary_select(Some(user_id));
    qb.push(", fav.created_at AS favorited_at FROM favorites fav JOIN properties p ON p.id = fav.property_id WHERE fav.user_id = ");
    qb.push_bind(user_id);
    qb.push(" ORDER BY fav.created_at DESC, p.id");
    page.push_limit(&mut qb);
    qb.build_query_as::<FavoriteRow>().fetch_all(db).await
}

pub async fn find(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Property>> {
    sqlx::query_as::<_, Property>(&format!(
        "SELECT {} FROM properties WHERE id = $1",
        PROPERTY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn detail(
    db: &PgPool,
    id: Uuid,
    viewer: Option<Uuid>,
) -> sqlx::Result<Option<PropertyDetailRow>> {
    let Some(property) = find(db, id).await? else {
        return Ok(None);
    };

    let (owner_name, owner_email): (String, String) =
        sqlx::query_as("SELECT name, email FROM users WHERE id = $1")
            .bind(property.owner_id)
            .fetch_one(db)
            .await?;

    let images = sqlx::query_as::<_, PropertyImage>(
        r#"
        SELECT id, image_key, order_index
          FROM property_images
         WHERE property_id = $1
         ORDER BY order_index, id
        "#,
    )
    .bind(id)
    .fetch_all(db)
    .await?;

    let amenities = sqlx::query_as::<_, Amenity>(
        "SELECT id, name, icon FROM amenities WHERE property_id = $1 ORDER BY name, id",
    )
    .bind(id)
    .fetch_all(db)
    .await?;

    let (favorites_count, is_favorited): (i64, bool) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COALESCE(BOOL_OR(user_id = $2), FALSE)
          FROM favorites
         WHERE property_id = $1
        "#,
    )
    .bind(id)
    .bind(viewer)
    .fetch_one(db)
    .await?;

    Ok(Some(PropertyDetailRow {
        owner_name: display_name(&owner_name, &owner_email).to_string(),
        property,
        images,
        amenities,
        favorites_count,
        is_favorited,
    }))
}

pub async fn create(db: &PgPool, owner_id: Uuid, new: NewProperty) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let mut tx = db.begin().await.context("begin tx")?;
    sqlx::query(
        r#"
        INSERT INTO properties (id, owner_id, title, description, location, price,
                                property_type, listing_type, bedrooms, bathrooms,
                                area_sqft, is_featured)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.location)
    .bind(new.price)
    .bind(new.property_type.as_str())
    .bind(new.listing_type.as_str())
    .bind(new.bedrooms)
    .bind(new.bathrooms)
    .bind(new.area_sqft)
    .bind(new.is_featured)
    .execute(&mut *tx)
    .await
    .context("insert property")?;

    for (name, icon) in &new.amenities {
        sqlx::query("INSERT INTO amenities (id, property_id, name, icon) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(name)
            .bind(icon)
            .execute(&mut *tx)
            .await
            .context("insert amenity")?;
    }

    tx.commit().await.context("commit tx")?;
    Ok(id)
}

pub async fn update(db: &PgPool, id: Uuid, changes: PropertyChanges) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE properties
           SET title         = COALESCE($2, title),
               description   = COALESCE($3, description),
               location      = COALESCE($4, location),
               price         = COALESCE($5, price),
               property_type = COALESCE($6, property_type),
               listing_type  = COALESCE($7, listing_type),
               bedrooms      = COALESCE($8, bedrooms),
               bathrooms     = COALESCE($9, bathrooms),
               area_sqft     = COALESCE($10, area_sqft),
               is_featured   = COALESCE($11, is_featured),
               updated_at    = now()
         WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(changes.title)
    .bind(changes.description)
    .bind(changes.location)
    .bind(changes.price)
    .bind(changes.property_type.map(|t| t.as_str()))
    .bind(changes.listing_type.map(|t| t.as_str()))
    .bind(changes.bedrooms)
    .bind(changes.bathrooms)
    .bind(changes.area_sqft)
    .bind(changes.is_featured)
    .execute(db)
    .await?;
    Ok(())
}

/// Deletes the property (children cascade) and returns the object keys that
/// are now orphaned in storage.
pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<Vec<String>> {
    let mut tx = db.begin().await.context("begin tx")?;
    let keys: Vec<String> =
        sqlx::query_scalar("SELECT image_key FROM property_images WHERE property_id = $1")
            .bind(id)
            .fetch_all(&mut *tx)
            .await
            .context("list image keys")?;
    sqlx::query("DELETE FROM properties WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("delete property")?;
    tx.commit().await.context("commit tx")?;
    Ok(keys)
}

/// Appends images after the current last one.
pub async fn insert_images_tx(
    tx: &mut Transaction<'_, Postgres>,
    property_id: Uuid,
    keys: &[String],
) -> anyhow::Result<Vec<PropertyImage>> {
    let next: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(order_index) + 1, 0) FROM property_images WHERE property_id = $1",
    )
    .bind(property_id)
    .fetch_one(&mut **tx)
    .await
    .context("next image order")?;

    let mut out = Vec::with_capacity(keys.len());
    for (offset, key) in keys.iter().enumerate() {
        let image = PropertyImage {
            id: Uuid::new_v4(),
            image_key: key.clone(),
            order_index: next + offset as i32,
        };
        sqlx::query(
            "INSERT INTO property_images (id, property_id, image_key, order_index) VALUES ($1, $2, $3, $4)",
        )
        .bind(image.id)
        .bind(property_id)
        .bind(&image.image_key)
        .bind(image.order_index)
        .execute(&mut **tx)
        .await
        .context("insert property image")?;
        out.push(image);
    }
    Ok(out)
}
