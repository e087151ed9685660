use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::{
    constants::{
        COLOR_PATTERN, EMAIL_MAX_LENGTH, EMAIL_PATTERN, INGREDIENT_NAME_MAX_LENGTH,
        MEASUREMENT_UNIT_MAX_LENGTH, RECIPE_NAME_MAX_LENGTH, SLUG_PATTERN, TAG_FIELD_MAX_LENGTH,
        USERNAME_PATTERN, USER_FIELD_MAX_LENGTH,
    },
    error::Error,
    schema::Id,
};

const REQUIRED: &str = "This field is required.";

lazy_static! {
    static ref USERNAME_REGEX: Regex = Regex::new(USERNAME_PATTERN).unwrap();
    static ref EMAIL_REGEX: Regex = Regex::new(EMAIL_PATTERN).unwrap();
    static ref SLUG_REGEX: Regex = Regex::new(SLUG_PATTERN).unwrap();
    static ref COLOR_REGEX: Regex = Regex::new(COLOR_PATTERN).unwrap();
}

fn required_text(field: &str, value: Option<String>, max: usize) -> Result<String, Error> {
    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
    if value.is_empty() {
        return Err(Error::field(field, REQUIRED));
    }
    if value.chars().count() > max {
        return Err(Error::field(
            field,
            &format!("Ensure this field has no more than {max} characters."),
        ));
    }
    Ok(value)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl RegisterForm {
    pub fn validate(self) -> Result<NewUser, Error> {
        let email = required_text("email", self.email, EMAIL_MAX_LENGTH)?;
        if !EMAIL_REGEX.is_match(&email) {
            return Err(Error::field("email", "Enter a valid email address."));
        }

        let username = required_text("username", self.username, USER_FIELD_MAX_LENGTH)?;
        if !USERNAME_REGEX.is_match(&username) {
            return Err(Error::field(
                "username",
                "Username may contain only letters, digits and @/./+/-/_ characters.",
            ));
        }

        let first_name = required_text("first_name", self.first_name, USER_FIELD_MAX_LENGTH)?;
        let last_name = required_text("last_name", self.last_name, USER_FIELD_MAX_LENGTH)?;

        // Passwords are not trimmed.
        let password = self.password.unwrap_or_default();
        if password.is_empty() {
            return Err(Error::field("password", REQUIRED));
        }
        if password.chars().count() > USER_FIELD_MAX_LENGTH {
            return Err(Error::field(
                "password",
                &format!("Ensure this field has no more than {USER_FIELD_MAX_LENGTH} characters."),
            ));
        }

        Ok(NewUser {
            email: email.to_lowercase(),
            username,
            first_name,
            last_name,
            password,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SetPasswordForm {
    pub new_password: Option<String>,
    pub current_password: Option<String>,
}

impl SetPasswordForm {
    pub fn validate(self) -> Result<(String, String), Error> {
        let current = self.current_password.unwrap_or_default();
        if current.is_empty() {
            return Err(Error::field("current_password", REQUIRED));
        }
        let new = self.new_password.unwrap_or_default();
        if new.is_empty() {
            return Err(Error::field("new_password", REQUIRED));
        }
        if new.chars().count() > USER_FIELD_MAX_LENGTH {
            return Err(Error::field(
                "new_password",
                &format!("Ensure this field has no more than {USER_FIELD_MAX_LENGTH} characters."),
            ));
        }
        Ok((current, new))
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct IngredientAmount {
    pub id: Id,
    pub amount: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecipeForm {
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub tags: Option<Vec<Id>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
}

/// A recipe payload that passed every check not requiring the database.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDraft {
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<Id>,
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
}

impl RecipeForm {
    /// `image_required` is false for partial updates, which keep the stored image.
    pub fn validate(self, image_required: bool) -> Result<RecipeDraft, Error> {
        let ingredients = self.ingredients.unwrap_or_default();
        if ingredients.is_empty() {
            return Err(Error::field("ingredients", "Add at least one ingredient."));
        }
        let mut seen = HashSet::new();
        for ingredient in ingredients.iter() {
            if !seen.insert(ingredient.id) {
                return Err(Error::field("ingredients", "Ingredients must be unique."));
            }
            if ingredient.amount < 1 {
                return Err(Error::field(
                    "ingredients",
                    "Ingredient amount must be at least 1.",
                ));
            }
        }

        let tags = self.tags.unwrap_or_default();
        if tags.is_empty() {
            return Err(Error::field("tags", "Add at least one tag."));
        }
        let mut seen = HashSet::new();
        if !tags.iter().all(|tag| seen.insert(*tag)) {
            return Err(Error::field("tags", "Tags must be unique."));
        }

        let image = self.image.filter(|image| !image.trim().is_empty());
        if image_required && image.is_none() {
            return Err(Error::field("image", REQUIRED));
        }

        let name = required_text("name", self.name, RECIPE_NAME_MAX_LENGTH)?;
        let text = self.text.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(Error::field("text", REQUIRED));
        }

        let cooking_time = match self.cooking_time {
            Some(time) if time >= 1 => time,
            Some(_) => {
                return Err(Error::field(
                    "cooking_time",
                    "Cooking time must be at least 1 minute.",
                ))
            }
            None => return Err(Error::field("cooking_time", REQUIRED)),
        };

        Ok(RecipeDraft {
            ingredients,
            tags,
            image,
            name,
            text,
            cooking_time,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TagForm {
    pub name: Option<String>,
    pub color: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl TagForm {
    pub fn validate(self) -> Result<NewTag, Error> {
        let name = required_text("name", self.name, TAG_FIELD_MAX_LENGTH)?;
        let color = required_text("color", self.color, TAG_FIELD_MAX_LENGTH)?;
        if !COLOR_REGEX.is_match(&color) {
            return Err(Error::field("color", "Color must be a #RRGGBB hex code."));
        }
        let slug = required_text("slug", self.slug, TAG_FIELD_MAX_LENGTH)?;
        if !SLUG_REGEX.is_match(&slug) {
            return Err(Error::field(
                "slug",
                "Slug may contain only letters, digits, hyphens and underscores.",
            ));
        }

        Ok(NewTag {
            name,
            color: color.to_uppercase(),
            slug,
        })
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct IngredientForm {
    pub name: Option<String>,
    pub measurement_unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

impl IngredientForm {
    pub fn validate(self) -> Result<NewIngredient, Error> {
        Ok(NewIngredient {
            name: required_text("name", self.name, INGREDIENT_NAME_MAX_LENGTH)?,
            measurement_unit: required_text(
                "measurement_unit",
                self.measurement_unit,
                MEASUREMENT_UNIT_MAX_LENGTH,
            )?,
        })
    }
}
