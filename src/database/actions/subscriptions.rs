use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::{
    authentication::permissions::ActionType,
    database::{
        error::QueryError,
        form::Form,
        pagination::{PageContext, PageRequest},
    },
    error::{Error, HtmlError},
    jwt::SessionData,
    schema::{Id, ShortRecipe, Subscription, SubscriptionRow},
};

use super::users::get_user_by_id;

/// Reads `recipes_limit`; absent means every recipe.
pub fn recipes_limit(form: &Form) -> Result<Option<i64>, Error> {
    match form.get_number::<i64>("recipes_limit")? {
        Some(limit) if limit < 0 => Err(HtmlError::InvalidRequest.new(
            "recipes_limit must not be negative.",
        )),
        limit => Ok(limit),
    }
}

const SUBSCRIPTION_COLUMNS: &str = "
    u.email, u.id, u.username, u.first_name, u.last_name,
    (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
    COUNT(*) OVER() AS count
";

async fn check_author(
    pool: &Pool<Postgres>,
    session: &SessionData,
    author_id: Id,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageSubscriptions)?;
    if get_user_by_id(pool, author_id).await?.is_none() {
        return Err(HtmlError::NotFound.default());
    }
    if author_id == session.user_id {
        return Err(HtmlError::InvalidRequest.new("You cannot subscribe to yourself."));
    }
    Ok(())
}

pub async fn subscribe(
    pool: &Pool<Postgres>,
    session: &SessionData,
    author_id: Id,
    recipes_limit: Option<i64>,
) -> Result<Subscription, Error> {
    check_author(pool, session, author_id).await?;

    let inserted = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if inserted.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("You are already subscribed to this user."));
    }

    let row: SubscriptionRow = sqlx::query_as(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM users u WHERE u.id = $1"
    ))
    .bind(author_id)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    let mut recipes = list_author_recipes(pool, &[author_id], recipes_limit).await?;
    log::debug!("User {} subscribed to {author_id}", session.user_id);
    Ok(Subscription::from_row(
        row,
        recipes.remove(&author_id).unwrap_or_default(),
    ))
}

pub async fn unsubscribe(
    pool: &Pool<Postgres>,
    session: &SessionData,
    author_id: Id,
) -> Result<(), Error> {
    check_author(pool, session, author_id).await?;

    let deleted = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(session.user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if deleted.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("You are not subscribed to this user."));
    }

    Ok(())
}

pub async fn fetch_subscriptions(
    pool: &Pool<Postgres>,
    session: &SessionData,
    page: &PageRequest,
    recipes_limit: Option<i64>,
) -> Result<PageContext<Subscription>, Error> {
    let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
        "
        SELECT {SUBSCRIPTION_COLUMNS}
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY s.id
        LIMIT $2 OFFSET $3
    "
    ))
    .bind(session.user_id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let author_ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let mut recipes = list_author_recipes(pool, &author_ids, recipes_limit).await?;

    let rows = rows
        .into_iter()
        .map(|row| {
            let author_recipes = recipes.remove(&row.id).unwrap_or_default();
            Subscription::from_row(row, author_recipes)
        })
        .collect();

    PageContext::from_rows(rows, total_count, page)
}

/// Newest recipes of each author, at most `limit` per author.
async fn list_author_recipes(
    pool: &Pool<Postgres>,
    author_ids: &[Id],
    limit: Option<i64>,
) -> Result<HashMap<Id, Vec<ShortRecipe>>, Error> {
    if author_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<ShortRecipe> = sqlx::query_as(
        "
        SELECT author_id, id, name, image, cooking_time
        FROM (
            SELECT r.*, ROW_NUMBER() OVER (
                PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC
            ) AS position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR position <= $2
        ORDER BY author_id, position
    ",
    )
    .bind(author_ids)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut grouped: HashMap<Id, Vec<ShortRecipe>> = HashMap::new();
    for recipe in rows {
        grouped
            .entry(recipe.author_id)
            .or_default()
            .push(recipe.with_url());
    }

    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::actions::fixtures;

    fn form(pairs: &[(&str, &str)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn recipes_limit_is_optional() {
        assert_eq!(recipes_limit(&form(&[])).unwrap(), None);
        assert_eq!(recipes_limit(&form(&[("recipes_limit", "3")])).unwrap(), Some(3));
    }

    #[test]
    fn recipes_limit_rejects_garbage() {
        assert_eq!(recipes_limit(&form(&[("recipes_limit", "-1")])).unwrap_err().code, 400);
        assert_eq!(recipes_limit(&form(&[("recipes_limit", "x")])).unwrap_err().code, 400);
    }

    #[sqlx::test]
    #[ignore = "needs a postgres server in DATABASE_URL"]
    async fn subscribing_checks_the_author(pool: Pool<Postgres>) {
        let reader = fixtures::user(&pool, "reader").await;
        let session = fixtures::session(reader);

        let err = subscribe(&pool, &session, reader + 100, None).await.unwrap_err();
        assert_eq!(err.code, 404);

        let err = subscribe(&pool, &session, reader, None).await.unwrap_err();
        assert_eq!(err.code, 400);
        assert_eq!(err.info.as_deref(), Some("You cannot subscribe to yourself."));

        let err = unsubscribe(&pool, &session, reader + 100).await.unwrap_err();
        assert_eq!(err.code, 404);
    }

    #[sqlx::test]
    #[ignore = "needs a postgres server in DATABASE_URL"]
    async fn subscriptions_are_unique(pool: Pool<Postgres>) {
        let reader = fixtures::user(&pool, "reader").await;
        let author = fixtures::user(&pool, "author").await;
        let session = fixtures::session(reader);

        subscribe(&pool, &session, author, None).await.unwrap();
        let err = subscribe(&pool, &session, author, None).await.unwrap_err();
        assert_eq!(err.code, 400);

        unsubscribe(&pool, &session, author).await.unwrap();
        let err = unsubscribe(&pool, &session, author).await.unwrap_err();
        assert_eq!(err.code, 400);
    }

    #[sqlx::test]
    #[ignore = "needs a postgres server in DATABASE_URL"]
    async fn recipes_are_truncated_newest_first(pool: Pool<Postgres>) {
        let reader = fixtures::user(&pool, "reader").await;
        let author = fixtures::user(&pool, "author").await;
        let quiet = fixtures::user(&pool, "quiet").await;
        let first = fixtures::recipe(&pool, author, "First", &[]).await;
        let second = fixtures::recipe(&pool, author, "Second", &[]).await;
        let third = fixtures::recipe(&pool, author, "Third", &[]).await;
        let session = fixtures::session(reader);

        let subscription = subscribe(&pool, &session, author, Some(2)).await.unwrap();
        assert!(subscription.is_subscribed);
        assert_eq!(subscription.recipes_count, 3);
        let ids: Vec<Id> = subscription.recipes.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third, second]);

        subscribe(&pool, &session, quiet, None).await.unwrap();
        let request = PageRequest::from_form("/api/users/subscriptions/", &form(&[])).unwrap();
        let page = fetch_subscriptions(&pool, &session, &request, None).await.unwrap();
        assert_eq!(page.count, 2);
        assert_eq!(page.results[0].id, author);
        let ids: Vec<Id> = page.results[0].recipes.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third, second, first]);
        assert!(page.results[1].recipes.is_empty());

        let page = fetch_subscriptions(&pool, &session, &request, Some(0)).await.unwrap();
        assert!(page.results[0].recipes.is_empty());
        assert_eq!(page.results[0].recipes_count, 3);
    }
}
