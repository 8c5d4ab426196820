pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE_SIZE: i64 = 1000;

pub const MEDIA_URL: &str = "/media/";
pub const RECIPE_IMAGE_DIR: &str = "uploads/recipe";

pub const NAME_MAX_LENGTH: usize = 255;
pub const PASSWORD_MIN_LENGTH: usize = 5;

pub const PRICE_MAX_DIGITS: usize = 5;
pub const PRICE_DECIMAL_PLACES: usize = 2;

pub const RECIPE_DEFAULT_ORDERING: &str = "-id";
pub const ATTRIBUTE_DEFAULT_ORDERING: &str = "-name";
