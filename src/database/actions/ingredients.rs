use sqlx::{Pool, Postgres};

use crate::{
    cache::cache::{Cache, CacheKeyType, CacheLifetime},
    database::{
        error::QueryError,
        payload::{IngredientForm, NewIngredient},
    },
    error::{Error, HtmlError},
    schema::{Id, Ingredient},
};

/// Case-insensitive prefix search ordered by name; no prefix lists everything.
/// Only the full list is cached, prefixes are matched in memory.
pub async fn search_ingredients(
    pool: &Pool<Postgres>,
    cache: &Cache,
    prefix: Option<&str>,
) -> Result<Vec<Ingredient>, Error> {
    let all = cache
        .get_or(CacheKeyType::Ingredient.new("all"), || async move {
            let rows: Vec<Ingredient> =
                sqlx::query_as("SELECT * FROM ingredients ORDER BY name, measurement_unit")
                    .fetch_all(pool)
                    .await
                    .map_err(QueryError::from)?;

            Ok(rows)
        })
        .await?;

    Ok(filter_by_prefix(all, prefix))
}

fn filter_by_prefix(ingredients: Vec<Ingredient>, prefix: Option<&str>) -> Vec<Ingredient> {
    let Some(prefix) = prefix.map(str::trim).filter(|p| !p.is_empty()) else {
        return ingredients;
    };
    let prefix = prefix.to_lowercase();

    ingredients
        .into_iter()
        .filter(|ingredient| ingredient.name.to_lowercase().starts_with(&prefix))
        .collect()
}

pub async fn get_ingredient(pool: &Pool<Postgres>, id: Id) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn create_ingredient(
    pool: &Pool<Postgres>,
    cache: &Cache,
    ingredient: NewIngredient,
) -> Result<Ingredient, Error> {
    let row: Ingredient = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING *",
    )
    .bind(&ingredient.name)
    .bind(&ingredient.measurement_unit)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    cache.rotate(CacheLifetime::BindIngredientCache).await;
    Ok(row)
}

/// Returns the subset of `ids` that exist.
pub async fn existing_ingredient_ids(
    pool: &Pool<Postgres>,
    ids: &[Id],
) -> Result<Vec<Id>, Error> {
    let rows: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

/// Parses a json array of `{name, measurement_unit}`.
pub fn parse_ingredient_file(contents: &str) -> Result<Vec<IngredientForm>, Error> {
    serde_json::from_str(contents)
        .map_err(|e| HtmlError::InvalidRequest.new(&format!("Invalid ingredient file: {e}")))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub created: usize,
    pub skipped: usize,
}

/// Inserts every valid entry; invalid and already existing ones are logged and skipped.
pub async fn load_ingredients(
    pool: &Pool<Postgres>,
    cache: &Cache,
    entries: Vec<IngredientForm>,
) -> Result<LoadReport, Error> {
    let mut report = LoadReport::default();

    for entry in entries {
        let ingredient = match entry.clone().validate() {
            Ok(ingredient) => ingredient,
            Err(e) => {
                log::warn!("Skipping invalid ingredient {entry:?}: {e}");
                report.skipped += 1;
                continue;
            }
        };

        let inserted = sqlx::query(
            "
            INSERT INTO ingredients (name, measurement_unit)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
        ",
        )
        .bind(&ingredient.name)
        .bind(&ingredient.measurement_unit)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

        if inserted.rows_affected() > 0 {
            report.created += 1;
        } else {
            log::debug!(
                "Ingredient {} ({}) already exists",
                ingredient.name,
                ingredient.measurement_unit
            );
            report.skipped += 1;
        }
    }

    if report.created > 0 {
        cache.rotate(CacheLifetime::BindIngredientCache).await;
    }
    Ok(report)
}
