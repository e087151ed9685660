use serde::{Deserialize, Serialize};

use crate::media::media_url;

pub type Id = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
}

/// User as seen by another (possibly anonymous) user.
#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct UserRow {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,

    pub count: i64,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        Self {
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: row.is_subscribed,
        }
    }
}

/// Response of the registration endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedUser {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for CreatedUser {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkedRecipeTag {
    #[serde(skip)]
    pub recipe_id: Id,
    pub id: Id,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<LinkedRecipeTag> for Tag {
    fn from(value: LinkedRecipeTag) -> Self {
        Self {
            id: value.id,
            name: value.name,
            color: value.color,
            slug: value.slug,
        }
    }
}

/// Ingredient row of a recipe with its quantity.
#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipePart {
    #[serde(skip)]
    pub recipe_id: Id,
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// Tags and ingredients of a recipe; the part of a recipe that is cached.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecipeComposition {
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipePart>,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,

    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,

    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipePart>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

impl Recipe {
    pub fn from_parts(row: RecipeRow, author: UserProfile, composition: RecipeComposition) -> Self {
        Self {
            id: row.id,
            tags: composition.tags,
            author,
            ingredients: composition.ingredients,
            is_favorited: row.is_favorited,
            is_in_shopping_cart: row.is_in_shopping_cart,
            name: row.name,
            image: media_url(&row.image),
            text: row.text,
            cooking_time: row.cooking_time,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct ShortRecipe {
    #[serde(skip)]
    pub author_id: Id,
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl ShortRecipe {
    /// Rewrites the stored media path into a public url.
    pub fn with_url(mut self) -> Self {
        self.image = media_url(&self.image);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes: Vec<ShortRecipe>,
    pub recipes_count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct SubscriptionRow {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub recipes_count: i64,

    pub count: i64,
}

impl Subscription {
    pub fn from_row(row: SubscriptionRow, recipes: Vec<ShortRecipe>) -> Self {
        Self {
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: true,
            recipes,
            recipes_count: row.recipes_count,
        }
    }
}

/// One aggregated line of the shopping list.
#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub auth_token: String,
}
