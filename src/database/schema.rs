use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::time::OffsetDateTime;

use super::error::TypeError;
use crate::media::MediaStorage;

pub type Uuid = i32;

#[derive(
    Clone, Copy, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

impl TryFrom<Value> for UserRole {
    type Error = TypeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value.as_str() {
            Some("user") => Ok(Self::User),
            Some("admin") => Ok(Self::Admin),
            Some(_) => Err(TypeError::new("Invalid role, expected user or admin.")),
            None => Err(TypeError::new("Not a valid string.")),
        }
    }
}

/// Per-user recipe bookmark lists sharing the same add/remove semantics
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BookmarkList {
    Favourites,
    ShoppingCart,
}

impl BookmarkList {
    pub fn table(&self) -> &'static str {
        match self {
            BookmarkList::Favourites => "favourites",
            BookmarkList::ShoppingCart => "shopping_lists",
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: UserRole,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Public user representation, `is_subscribed` relative to the requester
#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

/// Returned after registration
#[derive(Debug, Clone, Serialize)]
pub struct CreatedUser {
    pub email: String,
    pub id: Uuid,
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

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct UserProfileRow {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes_count: i64,

    pub count: i64,
}

impl From<UserProfileRow> for UserProfile {
    fn from(row: UserProfileRow) -> Self {
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

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionProfile {
    #[serde(flatten)]
    pub user: UserProfile,
    pub recipes: Vec<CompactRecipe>,
    pub recipes_count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForbiddenWord {
    pub id: Uuid,
    pub word: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i16,
    pub pub_date: OffsetDateTime,
}

/// Recipe joined with its author and the requester's bookmark flags
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i16,

    pub author_id: Uuid,
    pub author_email: String,
    pub author_username: String,
    pub author_first_name: String,
    pub author_last_name: String,
    pub author_is_subscribed: bool,

    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,

    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeTagRow {
    pub recipe_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<RecipeTagRow> for Tag {
    fn from(row: RecipeTagRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            color: row.color,
            slug: row.slug,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipePart {
    pub recipe_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i16,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecipePartNoId {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i16,
}

impl From<RecipePart> for RecipePartNoId {
    fn from(part: RecipePart) -> Self {
        Self {
            id: part.id,
            name: part.name,
            measurement_unit: part.measurement_unit,
            amount: part.amount,
        }
    }
}

/// Full recipe representation
#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    pub id: Uuid,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipePartNoId>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i16,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct CompactRecipe {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i16,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct AuthorRecipe {
    pub author_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i16,
}

/// Swaps stored media paths for public URLs before a value is rendered
pub trait ResolveMedia {
    fn resolve_media(self, media: &MediaStorage) -> Self;
}

impl ResolveMedia for CompactRecipe {
    fn resolve_media(mut self, media: &MediaStorage) -> Self {
        self.image = media.url_for(&self.image);
        self
    }
}

impl ResolveMedia for RecipeDetail {
    fn resolve_media(mut self, media: &MediaStorage) -> Self {
        self.image = media.url_for(&self.image);
        self
    }
}

impl ResolveMedia for SubscriptionProfile {
    fn resolve_media(mut self, media: &MediaStorage) -> Self {
        self.recipes = self
            .recipes
            .into_iter()
            .map(|recipe| recipe.resolve_media(media))
            .collect();
        self
    }
}

impl From<AuthorRecipe> for CompactRecipe {
    fn from(row: AuthorRecipe) -> Self {
        Self {
            id: row.id,
            name: row.name,
            image: row.image,
            cooking_time: row.cooking_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    pub id: Uuid,
    pub amount: i16,
}

/// Validated recipe fields. `image` holds the stored media path.
#[derive(Debug, Clone)]
pub struct RecipeData {
    pub name: Option<String>,
    pub image: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i16>,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<IngredientAmount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Vec<String>,
    pub author: Option<Uuid>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListEntry {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn subscription_profile_flattens_user() {
        let profile = SubscriptionProfile {
            user: UserProfile {
                email: String::from("chef@example.com"),
                id: 2,
                username: String::from("chef"),
                first_name: String::from("Anna"),
                last_name: String::from("Smith"),
                is_subscribed: true,
            },
            recipes: vec![CompactRecipe {
                id: 7,
                name: String::from("Soup"),
                image: String::from("/media/recipes/a.png"),
                cooking_time: 30,
            }],
            recipes_count: 4,
        };

        assert_eq!(
            serde_json::to_value(profile).unwrap(),
            json!({
                "email": "chef@example.com",
                "id": 2,
                "username": "chef",
                "first_name": "Anna",
                "last_name": "Smith",
                "is_subscribed": true,
                "recipes": [{ "id": 7, "name": "Soup", "image": "/media/recipes/a.png", "cooking_time": 30 }],
                "recipes_count": 4
            })
        );
    }

    #[test]
    fn user_role_from_value() {
        assert_eq!(UserRole::try_from(json!("admin")).unwrap(), UserRole::Admin);
        assert!(UserRole::try_from(json!("creator")).is_err());
        assert!(UserRole::try_from(json!(1)).is_err());
    }
}
