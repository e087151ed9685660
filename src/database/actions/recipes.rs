use std::collections::{HashMap, HashSet};

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    authentication::permissions::ActionType,
    cache::cache::{Cache, CacheKeyType},
    database::{error::QueryError, form::Form, pagination::PageContext, pagination::PageRequest},
    error::{Error, HtmlError},
    jwt::SessionData,
    media::MediaStore,
    payload::RecipeDraft,
    schema::{Id, Recipe, RecipeComposition, RecipePart, RecipeRow, ShortRecipe, UserProfile},
};

use super::{ingredients::existing_ingredient_ids, tags, users::list_profiles};

/// Query-string filters of the recipe list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    /// Any of these authors.
    pub authors: Vec<Id>,
    /// Any of these tag slugs.
    pub tags: Vec<String>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
}

impl RecipeFilter {
    pub fn from_form(form: &Form) -> Result<Self, Error> {
        Ok(Self {
            authors: form.get_numbers("author")?,
            tags: form
                .get_all("tags")
                .into_iter()
                .map(str::to_string)
                .collect(),
            is_favorited: form.get_flag("is_favorited")?,
            is_in_shopping_cart: form.get_flag("is_in_shopping_cart")?,
        })
    }
}

fn recipe_query(viewer: Option<Id>) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "SELECT r.id, r.author_id, r.name, r.text, r.image, r.cooking_time, \
         EXISTS(SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ",
    );
    builder.push_bind(viewer);
    builder.push(
        ") AS is_favorited, \
         EXISTS(SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ",
    );
    builder.push_bind(viewer);
    builder.push(") AS is_in_shopping_cart, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");
    builder
}

/// Anonymous viewers have no bookmarks: `true` matches nothing, `false` matches everything.
fn push_bookmark_filter(
    builder: &mut QueryBuilder<'static, Postgres>,
    table: &str,
    wanted: Option<bool>,
    viewer: Option<Id>,
) {
    let exists = match (wanted, viewer) {
        (Some(true), None) => {
            builder.push(" AND FALSE");
            return;
        }
        (Some(true), Some(_)) => " AND EXISTS",
        (Some(false), Some(_)) => " AND NOT EXISTS",
        (Some(false), None) | (None, _) => return,
    };

    builder.push(format!(
        "{exists}(SELECT 1 FROM {table} b WHERE b.recipe_id = r.id AND b.user_id = "
    ));
    builder.push_bind(viewer);
    builder.push(")");
}

fn push_filters(
    builder: &mut QueryBuilder<'static, Postgres>,
    filter: &RecipeFilter,
    viewer: Option<Id>,
) {
    if !filter.authors.is_empty() {
        builder.push(" AND r.author_id = ANY(");
        builder.push_bind(filter.authors.clone());
        builder.push(")");
    }

    if !filter.tags.is_empty() {
        builder.push(
            " AND EXISTS(SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
             WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        );
        builder.push_bind(filter.tags.clone());
        builder.push("))");
    }

    push_bookmark_filter(builder, "favorites", filter.is_favorited, viewer);
    push_bookmark_filter(builder, "shopping_cart", filter.is_in_shopping_cart, viewer);
}

pub async fn fetch_recipes(
    pool: &Pool<Postgres>,
    cache: &Cache,
    filter: &RecipeFilter,
    viewer: Option<Id>,
    page: &PageRequest,
) -> Result<PageContext<Recipe>, Error> {
    let mut builder = recipe_query(viewer);
    push_filters(&mut builder, filter, viewer);
    builder.push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ");
    builder.push_bind(page.limit);
    builder.push(" OFFSET ");
    builder.push_bind(page.offset());

    let rows: Vec<RecipeRow> = builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let recipes = assemble_recipes(pool, cache, rows, viewer).await?;

    PageContext::from_rows(recipes, total_count, page)
}

pub async fn get_recipe(
    pool: &Pool<Postgres>,
    cache: &Cache,
    id: Id,
    viewer: Option<Id>,
) -> Result<Option<Recipe>, Error> {
    let mut builder = recipe_query(viewer);
    builder.push(" AND r.id = ");
    builder.push_bind(id);

    let row: Option<RecipeRow> = builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    let Some(row) = row else {
        return Ok(None);
    };

    let recipe = assemble_recipes(pool, cache, vec![row], viewer).await?;
    Ok(recipe.into_iter().next())
}

pub async fn get_short_recipe(
    pool: &Pool<Postgres>,
    id: Id,
) -> Result<Option<ShortRecipe>, Error> {
    let row: Option<ShortRecipe> = sqlx::query_as(
        "SELECT author_id, id, name, image, cooking_time FROM recipes WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row.map(ShortRecipe::with_url))
}

/// Author id and stored image path of a recipe.
async fn get_recipe_owner(
    pool: &Pool<Postgres>,
    id: Id,
) -> Result<Option<(Id, String)>, Error> {
    let row: Option<(Id, String)> =
        sqlx::query_as("SELECT author_id, image FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

async fn assemble_recipes(
    pool: &Pool<Postgres>,
    cache: &Cache,
    rows: Vec<RecipeRow>,
    viewer: Option<Id>,
) -> Result<Vec<Recipe>, Error> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let recipe_ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let author_ids: Vec<Id> = rows
        .iter()
        .map(|row| row.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let authors: HashMap<Id, UserProfile> = list_profiles(pool, &author_ids, viewer)
        .await?
        .into_iter()
        .map(|profile| (profile.id, profile))
        .collect();
    let mut compositions = load_compositions(pool, cache, &recipe_ids).await?;

    rows.into_iter()
        .map(|row| {
            let author = authors.get(&row.author_id).cloned().ok_or_else(|| {
                log::error!("Author {} of recipe {} is missing", row.author_id, row.id);
                HtmlError::InternalServerError.default()
            })?;
            let composition = compositions.remove(&row.id).unwrap_or_default();
            Ok(Recipe::from_parts(row, author, composition))
        })
        .collect()
}

/// Compositions are cached per recipe; without a cache they are loaded in one go.
async fn load_compositions(
    pool: &Pool<Postgres>,
    cache: &Cache,
    recipe_ids: &[Id],
) -> Result<HashMap<Id, RecipeComposition>, Error> {
    if !cache.is_enabled() {
        return fetch_compositions(pool, recipe_ids).await;
    }

    let mut compositions = HashMap::new();
    for id in recipe_ids.iter().copied() {
        let composition = cache
            .get_or(CacheKeyType::Recipe.new(id), || async move {
                let mut fetched = fetch_compositions(pool, &[id]).await?;
                Ok(fetched.remove(&id).unwrap_or_default())
            })
            .await?;
        compositions.insert(id, composition);
    }

    Ok(compositions)
}

async fn fetch_compositions(
    pool: &Pool<Postgres>,
    recipe_ids: &[Id],
) -> Result<HashMap<Id, RecipeComposition>, Error> {
    let linked_tags = tags::list_recipe_tags(pool, recipe_ids).await?;
    let parts = list_recipe_parts(pool, recipe_ids).await?;

    let mut compositions: HashMap<Id, RecipeComposition> = HashMap::new();
    for tag in linked_tags {
        compositions
            .entry(tag.recipe_id)
            .or_default()
            .tags
            .push(tag.into());
    }
    for part in parts {
        compositions
            .entry(part.recipe_id)
            .or_default()
            .ingredients
            .push(part);
    }

    Ok(compositions)
}

pub async fn list_recipe_parts(
    pool: &Pool<Postgres>,
    recipe_ids: &[Id],
) -> Result<Vec<RecipePart>, Error> {
    let rows: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY ri.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Every referenced ingredient and tag must exist.
async fn check_references(pool: &Pool<Postgres>, draft: &RecipeDraft) -> Result<(), Error> {
    let ingredient_ids: Vec<Id> = draft.ingredients.iter().map(|i| i.id).collect();
    let existing: HashSet<Id> = existing_ingredient_ids(pool, &ingredient_ids)
        .await?
        .into_iter()
        .collect();
    if let Some(missing) = ingredient_ids.iter().find(|id| !existing.contains(id)) {
        return Err(Error::field(
            "ingredients",
            &format!("Ingredient {missing} does not exist."),
        ));
    }

    let existing: HashSet<Id> = tags::existing_tag_ids(pool, &draft.tags)
        .await?
        .into_iter()
        .collect();
    if let Some(missing) = draft.tags.iter().find(|id| !existing.contains(id)) {
        return Err(Error::field("tags", &format!("Tag {missing} does not exist.")));
    }

    Ok(())
}

/// Bulk inserts the tag links and ingredient rows of a recipe.
async fn write_composition(
    conn: &mut PgConnection,
    recipe_id: Id,
    draft: &RecipeDraft,
) -> Result<(), Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    query_builder.push_values(draft.tags.iter(), |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });
    query_builder
        .build()
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    query_builder.push_values(draft.ingredients.iter(), |mut b, ingredient| {
        b.push_bind(recipe_id)
            .push_bind(ingredient.id)
            .push_bind(ingredient.amount);
    });
    query_builder
        .build()
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

async fn insert_recipe(
    pool: &Pool<Postgres>,
    author_id: Id,
    draft: &RecipeDraft,
    image: &str,
) -> Result<Id, Error> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let id: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&draft.name)
    .bind(&draft.text)
    .bind(image)
    .bind(draft.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    write_composition(&mut tr, id.0, draft).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;
    Ok(id.0)
}

/// Creates a recipe for the session user and returns its id.
pub async fn create_recipe(
    pool: &Pool<Postgres>,
    media: &MediaStore,
    session: &SessionData,
    draft: RecipeDraft,
) -> Result<Id, Error> {
    session.authenticate(ActionType::CreateRecipes)?;
    check_references(pool, &draft).await?;

    let Some(data) = draft.image.as_deref() else {
        return Err(Error::field("image", "This field is required."));
    };
    let image = media.save_recipe_image(data).await?;

    match insert_recipe(pool, session.user_id, &draft, &image).await {
        Ok(id) => {
            log::info!("User {} created recipe {id}", session.user_id);
            Ok(id)
        }
        Err(e) => {
            media.remove(&image).await;
            Err(e)
        }
    }
}

async fn replace_recipe(
    pool: &Pool<Postgres>,
    id: Id,
    draft: &RecipeDraft,
    image: Option<&str>,
) -> Result<(), Error> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    sqlx::query(
        "
        UPDATE recipes
        SET name = $1, text = $2, cooking_time = $3, image = COALESCE($4, image)
        WHERE id = $5
    ",
    )
    .bind(&draft.name)
    .bind(&draft.text)
    .bind(draft.cooking_time)
    .bind(image)
    .bind(id)
    .execute(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    write_composition(&mut tr, id, draft).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;
    Ok(())
}

/// Rewrites a recipe owned by the session user (or any recipe for admins).
pub async fn update_recipe(
    pool: &Pool<Postgres>,
    cache: &Cache,
    media: &MediaStore,
    session: &SessionData,
    id: Id,
    draft: RecipeDraft,
) -> Result<(), Error> {
    let Some((author_id, old_image)) = get_recipe_owner(pool, id).await? else {
        return Err(HtmlError::NotFound.default());
    };
    session.authenticate_owner(author_id)?;
    check_references(pool, &draft).await?;

    let new_image = match draft.image.as_deref() {
        Some(data) => Some(media.save_recipe_image(data).await?),
        None => None,
    };

    if let Err(e) = replace_recipe(pool, id, &draft, new_image.as_deref()).await {
        if let Some(image) = &new_image {
            media.remove(image).await;
        }
        return Err(e);
    }

    if new_image.is_some() {
        media.remove(&old_image).await;
    }
    cache.invalidate(CacheKeyType::Recipe.new(id)).await;

    log::info!("User {} updated recipe {id}", session.user_id);
    Ok(())
}

pub async fn delete_recipe(
    pool: &Pool<Postgres>,
    cache: &Cache,
    media: &MediaStore,
    session: &SessionData,
    id: Id,
) -> Result<(), Error> {
    let Some((author_id, image)) = get_recipe_owner(pool, id).await? else {
        return Err(HtmlError::NotFound.default());
    };
    session.authenticate_owner(author_id)?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    media.remove(&image).await;
    cache.invalidate(CacheKeyType::Recipe.new(id)).await;

    log::info!("User {} deleted recipe {id}", session.user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::actions::{favorites::add_favorite, fixtures},
        payload::IngredientAmount,
    };

    fn form(pairs: &[(&str, &str)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn filtered_sql(filter: &RecipeFilter, viewer: Option<Id>) -> String {
        let mut builder = recipe_query(viewer);
        push_filters(&mut builder, filter, viewer);
        builder.sql().to_string()
    }

    #[test]
    fn filter_reads_repeated_keys() {
        let filter = RecipeFilter::from_form(&form(&[
            ("author", "1"),
            ("author", "2"),
            ("tags", "breakfast"),
            ("tags", "lunch"),
            ("is_favorited", "1"),
            ("is_in_shopping_cart", "false"),
        ]))
        .unwrap();

        assert_eq!(filter.authors, vec![1, 2]);
        assert_eq!(filter.tags, vec!["breakfast", "lunch"]);
        assert_eq!(filter.is_favorited, Some(true));
        assert_eq!(filter.is_in_shopping_cart, Some(false));
    }

    #[test]
    fn filter_rejects_bad_values() {
        assert_eq!(
            RecipeFilter::from_form(&form(&[("author", "me")]))
                .unwrap_err()
                .code,
            400
        );
        assert_eq!(
            RecipeFilter::from_form(&form(&[("is_favorited", "maybe")]))
                .unwrap_err()
                .code,
            400
        );
    }

    #[test]
    fn unfiltered_query_binds_viewer_twice() {
        let sql = filtered_sql(&RecipeFilter::default(), Some(3));
        assert!(sql.contains("f.user_id = $1"));
        assert!(sql.contains("c.user_id = $2"));
        assert!(sql.ends_with("WHERE TRUE"));
    }

    #[test]
    fn author_and_tag_filters_are_any_matches() {
        let filter = RecipeFilter {
            authors: vec![1, 2],
            tags: vec!["lunch".into()],
            ..Default::default()
        };
        let sql = filtered_sql(&filter, None);
        assert!(sql.contains("AND r.author_id = ANY($3)"));
        assert!(sql.contains("t.slug = ANY($4)"));
    }

    #[test]
    fn anonymous_favorites_filter_matches_nothing() {
        let filter = RecipeFilter {
            is_favorited: Some(true),
            is_in_shopping_cart: Some(false),
            ..Default::default()
        };
        let sql = filtered_sql(&filter, None);
        assert!(sql.ends_with("WHERE TRUE AND FALSE"));
    }

    #[test]
    fn bookmark_filters_for_a_user() {
        let filter = RecipeFilter {
            is_favorited: Some(true),
            is_in_shopping_cart: Some(false),
            ..Default::default()
        };
        let sql = filtered_sql(&filter, Some(7));
        assert!(sql.contains(" AND EXISTS(SELECT 1 FROM favorites b WHERE b.recipe_id = r.id AND b.user_id = $3)"));
        assert!(sql.contains(" AND NOT EXISTS(SELECT 1 FROM shopping_cart b WHERE b.recipe_id = r.id AND b.user_id = $4)"));
    }

    fn draft(ingredients: &[(Id, i32)], tags: &[Id]) -> RecipeDraft {
        RecipeDraft {
            ingredients: ingredients
                .iter()
                .map(|&(id, amount)| IngredientAmount { id, amount })
                .collect(),
            tags: tags.to_vec(),
            image: None,
            name: "Pancakes".into(),
            text: "Whisk and fry.".into(),
            cooking_time: 20,
        }
    }

    fn tag_ids(recipe: &Recipe) -> Vec<Id> {
        let mut ids: Vec<Id> = recipe.tags.iter().map(|t| t.id).collect();
        ids.sort();
        ids
    }

    fn amounts(recipe: &Recipe) -> Vec<(Id, i32)> {
        recipe.ingredients.iter().map(|i| (i.id, i.amount)).collect()
    }

    #[sqlx::test]
    #[ignore = "needs a postgres server in DATABASE_URL"]
    async fn composition_is_written_and_replaced(pool: Pool<Postgres>) {
        let cook = fixtures::user(&pool, "cook").await;
        let flour = fixtures::ingredient(&pool, "flour", "g").await;
        let milk = fixtures::ingredient(&pool, "milk", "ml").await;
        let eggs = fixtures::ingredient(&pool, "eggs", "pcs").await;
        let breakfast = fixtures::tag(&pool, "breakfast", "#E26C2D").await;
        let lunch = fixtures::tag(&pool, "lunch", "#49B64E").await;
        let cache = Cache::disabled();

        let created = draft(&[(flour, 200), (milk, 300)], &[breakfast, lunch]);
        let id = insert_recipe(&pool, cook, &created, "recipes/p.png").await.unwrap();

        let recipe = get_recipe(&pool, &cache, id, None).await.unwrap().unwrap();
        assert_eq!(recipe.author.id, cook);
        assert_eq!(amounts(&recipe), vec![(flour, 200), (milk, 300)]);
        assert_eq!(tag_ids(&recipe), vec![breakfast, lunch]);

        replace_recipe(&pool, id, &draft(&[(eggs, 3)], &[lunch]), None)
            .await
            .unwrap();

        let recipe = get_recipe(&pool, &cache, id, None).await.unwrap().unwrap();
        assert_eq!(amounts(&recipe), vec![(eggs, 3)]);
        assert_eq!(tag_ids(&recipe), vec![lunch]);
        assert!(recipe.image.ends_with("recipes/p.png"));
        assert_eq!(list_recipe_parts(&pool, &[id]).await.unwrap().len(), 1);
    }

    #[sqlx::test]
    #[ignore = "needs a postgres server in DATABASE_URL"]
    async fn unknown_references_are_field_errors(pool: Pool<Postgres>) {
        let flour = fixtures::ingredient(&pool, "flour", "g").await;
        let lunch = fixtures::tag(&pool, "lunch", "#49B64E").await;

        let err = check_references(&pool, &draft(&[(flour, 1), (flour + 100, 1)], &[lunch]))
            .await
            .unwrap_err();
        assert_eq!(err.field.as_deref(), Some("ingredients"));

        let err = check_references(&pool, &draft(&[(flour, 1)], &[lunch + 100]))
            .await
            .unwrap_err();
        assert_eq!(err.field.as_deref(), Some("tags"));

        assert!(check_references(&pool, &draft(&[(flour, 1)], &[lunch])).await.is_ok());
    }

    #[sqlx::test]
    #[ignore = "needs a postgres server in DATABASE_URL"]
    async fn list_filters_by_tag_and_favorites(pool: Pool<Postgres>) {
        let cook = fixtures::user(&pool, "cook").await;
        let fan = fixtures::user(&pool, "fan").await;
        let flour = fixtures::ingredient(&pool, "flour", "g").await;
        let breakfast = fixtures::tag(&pool, "breakfast", "#E26C2D").await;
        let lunch = fixtures::tag(&pool, "lunch", "#49B64E").await;
        let cache = Cache::disabled();

        let pancakes = insert_recipe(&pool, cook, &draft(&[(flour, 1)], &[breakfast]), "a.png")
            .await
            .unwrap();
        let soup = insert_recipe(&pool, cook, &draft(&[(flour, 2)], &[lunch]), "b.png")
            .await
            .unwrap();
        add_favorite(&pool, &fixtures::session(fan), soup).await.unwrap();

        let request = PageRequest::from_form("/api/recipes/", &form(&[])).unwrap();
        let list = |filter: RecipeFilter| {
            let (pool, cache, request) = (&pool, &cache, &request);
            async move {
                fetch_recipes(pool, cache, &filter, Some(fan), request)
                    .await
                    .unwrap()
            }
        };

        let page = list(RecipeFilter::default()).await;
        assert_eq!(page.count, 2);
        assert_eq!(page.results.iter().map(|r| r.id).collect::<Vec<_>>(), vec![soup, pancakes]);
        assert!(page.results[0].is_favorited);
        assert!(!page.results[1].is_favorited);

        let page = list(RecipeFilter {
            tags: vec!["breakfast".into()],
            ..Default::default()
        })
        .await;
        assert_eq!(page.results.iter().map(|r| r.id).collect::<Vec<_>>(), vec![pancakes]);

        let page = list(RecipeFilter {
            is_favorited: Some(true),
            ..Default::default()
        })
        .await;
        assert_eq!(page.results.iter().map(|r| r.id).collect::<Vec<_>>(), vec![soup]);
    }
}
