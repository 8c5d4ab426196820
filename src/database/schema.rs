use serde::Serialize;

use crate::constants::MEDIA_URL;

pub type Uuid = i32;

/// Columns selected for a recipe. `price` is NUMERIC(5, 2) in the database and
/// travels as its exact text form.
pub const RECIPE_COLUMNS: &str = "r.id, r.user_id, r.title, r.description, r.time_minutes, r.price::TEXT AS price, r.link, r.image";

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password: String,
    pub is_active: bool,
    pub is_staff: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.to_owned(),
            name: user.name.to_owned(),
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserListRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

/// Tags and ingredients share one shape and one set of queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Tag,
    Ingredient,
}

impl AttributeKind {
    pub fn table(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Ingredient => "ingredients",
        }
    }

    pub fn link_table(self) -> &'static str {
        match self {
            AttributeKind::Tag => "recipe_tags",
            AttributeKind::Ingredient => "recipe_ingredients",
        }
    }

    pub fn link_column(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tag_id",
            AttributeKind::Ingredient => "ingredient_id",
        }
    }

    /// Key used for this attribute in recipe payloads and query strings.
    pub fn field(self) -> &'static str {
        self.table()
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Attribute {
    pub id: Uuid,
    pub name: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct AttributeRow {
    pub id: Uuid,
    pub name: String,
    pub count: i64,
}

impl From<AttributeRow> for Attribute {
    fn from(row: AttributeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct LinkedAttribute {
    pub recipe_id: Uuid,
    pub id: Uuid,
    pub name: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Recipe {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub time_minutes: i32,
    pub price: String,
    pub link: String,
    pub image: Option<String>,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    #[sqlx(flatten)]
    pub recipe: Recipe,
    pub count: i64,
}

/// List representation of a recipe.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipeSummary {
    pub id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: String,
    pub link: String,
    pub tags: Vec<Attribute>,
    pub ingredients: Vec<Attribute>,
}

/// Detail representation: the summary plus description and image.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub summary: RecipeSummary,
    pub description: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipeImage {
    pub id: Uuid,
    pub image: Option<String>,
}

impl Recipe {
    pub fn summary(&self, tags: Vec<Attribute>, ingredients: Vec<Attribute>) -> RecipeSummary {
        RecipeSummary {
            id: self.id,
            title: self.title.to_owned(),
            time_minutes: self.time_minutes,
            price: self.price.to_owned(),
            link: self.link.to_owned(),
            tags,
            ingredients,
        }
    }

    pub fn detail(&self, tags: Vec<Attribute>, ingredients: Vec<Attribute>) -> RecipeDetail {
        RecipeDetail {
            summary: self.summary(tags, ingredients),
            description: self.description.to_owned(),
            image: self.image_url(),
        }
    }

    pub fn image_url(&self) -> Option<String> {
        self.image.as_ref().map(|path| format!("{MEDIA_URL}{path}"))
    }
}
