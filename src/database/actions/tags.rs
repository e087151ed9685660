use sqlx::{Pool, Postgres};

use crate::{
    cache::cache::{Cache, CacheKeyType, CacheLifetime},
    database::{error::QueryError, payload::NewTag},
    error::Error,
    schema::{Id, LinkedRecipeTag, Tag},
};

pub async fn list_tags(pool: &Pool<Postgres>, cache: &Cache) -> Result<Vec<Tag>, Error> {
    cache
        .get_or(CacheKeyType::Tag.new("all"), || async move {
            let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
                .fetch_all(pool)
                .await
                .map_err(QueryError::from)?;

            Ok(list)
        })
        .await
}

pub async fn get_tag(pool: &Pool<Postgres>, id: Id) -> Result<Option<Tag>, Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(tag)
}

pub async fn create_tag(pool: &Pool<Postgres>, cache: &Cache, tag: NewTag) -> Result<Tag, Error> {
    let row: Tag = sqlx::query_as("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING *")
        .bind(&tag.name)
        .bind(&tag.color)
        .bind(&tag.slug)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    cache.rotate(CacheLifetime::BindTagCache).await;
    log::info!("Created tag {} ({})", row.slug, row.id);
    Ok(row)
}

/// Returns the subset of `ids` that exist.
pub async fn existing_tag_ids(pool: &Pool<Postgres>, ids: &[Id]) -> Result<Vec<Id>, Error> {
    let rows: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

pub async fn list_recipe_tags(
    pool: &Pool<Postgres>,
    recipe_ids: &[Id],
) -> Result<Vec<LinkedRecipeTag>, Error> {
    let list: Vec<LinkedRecipeTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.name
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(list)
}
