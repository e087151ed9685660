use sqlx::{Pool, Postgres};

use crate::{
    authentication::permissions::ActionType,
    database::error::QueryError,
    error::{Error, HtmlError},
    jwt::SessionData,
    schema::{Id, ShortRecipe},
};

use super::recipes::get_short_recipe;

pub async fn add_favorite(
    pool: &Pool<Postgres>,
    session: &SessionData,
    recipe_id: Id,
) -> Result<ShortRecipe, Error> {
    session.authenticate(ActionType::ManageFavorites)?;
    let Some(recipe) = get_short_recipe(pool, recipe_id).await? else {
        return Err(HtmlError::NotFound.default());
    };

    let inserted = sqlx::query(
        "INSERT INTO favorites (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if inserted.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("Recipe is already in favorites."));
    }

    Ok(recipe)
}

pub async fn remove_favorite(
    pool: &Pool<Postgres>,
    session: &SessionData,
    recipe_id: Id,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageFavorites)?;
    if get_short_recipe(pool, recipe_id).await?.is_none() {
        return Err(HtmlError::NotFound.default());
    }

    let deleted = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2")
        .bind(session.user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if deleted.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("Recipe is not in favorites."));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::actions::fixtures;

    #[sqlx::test]
    #[ignore = "needs a postgres server in DATABASE_URL"]
    async fn favorites_are_unique_per_user(pool: Pool<Postgres>) {
        let cook = fixtures::user(&pool, "cook").await;
        let fan = fixtures::user(&pool, "fan").await;
        let recipe = fixtures::recipe(&pool, cook, "Soup", &[]).await;

        let short = add_favorite(&pool, &fixtures::session(fan), recipe).await.unwrap();
        assert_eq!((short.id, short.name.as_str()), (recipe, "Soup"));
        assert!(short.image.starts_with("/media/"));

        let err = add_favorite(&pool, &fixtures::session(fan), recipe).await.unwrap_err();
        assert_eq!(err.code, 400);

        add_favorite(&pool, &fixtures::session(cook), recipe).await.unwrap();
        remove_favorite(&pool, &fixtures::session(fan), recipe).await.unwrap();

        let err = remove_favorite(&pool, &fixtures::session(fan), recipe).await.unwrap_err();
        assert_eq!(err.code, 400);
    }

    #[sqlx::test]
    #[ignore = "needs a postgres server in DATABASE_URL"]
    async fn unknown_recipe_is_not_found(pool: Pool<Postgres>) {
        let fan = fixtures::user(&pool, "fan").await;

        let err = add_favorite(&pool, &fixtures::session(fan), 404).await.unwrap_err();
        assert_eq!(err.code, 404);
        let err = remove_favorite(&pool, &fixtures::session(fan), 404).await.unwrap_err();
        assert_eq!(err.code, 404);
    }
}
