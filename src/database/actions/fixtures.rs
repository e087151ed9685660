//! Rows for the database tests. Every `#[sqlx::test]` gets a fresh, migrated
//! database from `DATABASE_URL`.

use sqlx::{Pool, Postgres};

use crate::{
    jwt::SessionData,
    schema::{Id, UserRole},
};

pub fn session(user_id: Id) -> SessionData {
    SessionData {
        user_id,
        username: format!("user{user_id}"),
        role: UserRole::User,
        session_id: format!("sid-{user_id}"),
        expires_at: i64::MAX,
    }
}

pub async fn user(pool: &Pool<Postgres>, username: &str) -> Id {
    let row: (Id,) = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, 'First', 'Last', 'x')
        RETURNING id
    ",
    )
    .bind(format!("{username}@example.com"))
    .bind(username)
    .fetch_one(pool)
    .await
    .unwrap();
    row.0
}

pub async fn ingredient(pool: &Pool<Postgres>, name: &str, unit: &str) -> Id {
    let row: (Id,) = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING id",
    )
    .bind(name)
    .bind(unit)
    .fetch_one(pool)
    .await
    .unwrap();
    row.0
}

pub async fn tag(pool: &Pool<Postgres>, slug: &str, color: &str) -> Id {
    let row: (Id,) =
        sqlx::query_as("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $1) RETURNING id")
            .bind(slug)
            .bind(color)
            .fetch_one(pool)
            .await
            .unwrap();
    row.0
}

/// A recipe with the given `(ingredient, amount)` rows and no tags.
pub async fn recipe(
    pool: &Pool<Postgres>,
    author_id: Id,
    name: &str,
    ingredients: &[(Id, i32)],
) -> Id {
    let row: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, 'Mix and serve.', 'recipes/test.png', 10)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap();

    for (ingredient_id, amount) in ingredients {
        sqlx::query(
            "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES ($1, $2, $3)",
        )
        .bind(row.0)
        .bind(ingredient_id)
        .bind(amount)
        .execute(pool)
        .await
        .unwrap();
    }
    row.0
}
