pub const PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const FIRSTNAME_MAX_LENGTH: usize = 150;
pub const LASTNAME_MAX_LENGTH: usize = 150;
pub const PASSWORD_MIN_LENGTH: usize = 8;

pub const TAGNAME_MAX_LENGTH: usize = 200;
pub const SLUG_MAX_LENGTH: usize = 200;
pub const COLOR_CODE_MAX_LENGTH: usize = 7;
pub const DEFAULT_TAG_COLOR: &str = "#8420D3";

pub const INGREDIENT_NAME_MAX_LENGTH: usize = 200;
pub const MEASUREMENT_UNIT_MAX_LENGTH: usize = 200;
pub const RECIPE_NAME_MAX_LENGTH: usize = 200;

pub const WORD_MAX_LENGTH: usize = 50;
pub const OBSCENITY_THRESHOLD: usize = 2;

/// Lower bound for cooking time and ingredient amounts
pub const MIN_VALUE: i64 = 1;
/// Upper bound of a `SMALLINT` column
pub const MAX_SMALL_VALUE: i64 = i16::MAX as i64;

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.csv";
pub const SHOPPING_LIST_HEADER: &[&str] = &["Ingredient", "Measurement unit", "Amount"];

pub const IMAGE_FORMATS: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
];
