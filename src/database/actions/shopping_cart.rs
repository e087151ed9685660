use sqlx::{Pool, Postgres};

use crate::{
    authentication::permissions::ActionType,
    database::error::QueryError,
    error::{Error, HtmlError},
    jwt::SessionData,
    schema::{Id, ShoppingListItem, ShortRecipe},
};

use super::recipes::get_short_recipe;

pub async fn add_to_cart(
    pool: &Pool<Postgres>,
    session: &SessionData,
    recipe_id: Id,
) -> Result<ShortRecipe, Error> {
    session.authenticate(ActionType::ManageShoppingCart)?;
    let Some(recipe) = get_short_recipe(pool, recipe_id).await? else {
        return Err(HtmlError::NotFound.default());
    };

    let inserted = sqlx::query(
        "INSERT INTO shopping_cart (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if inserted.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("Recipe is already in the shopping cart."));
    }

    Ok(recipe)
}

pub async fn remove_from_cart(
    pool: &Pool<Postgres>,
    session: &SessionData,
    recipe_id: Id,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageShoppingCart)?;
    if get_short_recipe(pool, recipe_id).await?.is_none() {
        return Err(HtmlError::NotFound.default());
    }

    let deleted = sqlx::query("DELETE FROM shopping_cart WHERE user_id = $1 AND recipe_id = $2")
        .bind(session.user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if deleted.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("Recipe is not in the shopping cart."));
    }

    Ok(())
}

/// Ingredient totals over every recipe in the user's cart, ordered by name.
pub async fn shopping_list(
    pool: &Pool<Postgres>,
    user_id: Id,
) -> Result<Vec<ShoppingListItem>, Error> {
    let rows: Vec<ShoppingListItem> = sqlx::query_as(
        "
        SELECT i.name, i.measurement_unit, SUM(ri.amount)::BIGINT AS amount
        FROM shopping_cart sc
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE sc.user_id = $1
        GROUP BY i.id, i.name, i.measurement_unit
        ORDER BY i.name, i.measurement_unit
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// One `<name> (<unit>) - <amount>` line per item under a header.
pub fn render_shopping_list(username: &str, items: &[ShoppingListItem]) -> String {
    let lines: String = items
        .iter()
        .map(|item| format!("{} ({}) - {}\n", item.name, item.measurement_unit, item.amount))
        .collect();
    format!("Shopping list for {username}\n\n{lines}")
}
