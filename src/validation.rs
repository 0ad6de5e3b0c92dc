use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::{
    constants::{
        COLOR_CODE_MAX_LENGTH, DEFAULT_TAG_COLOR, EMAIL_MAX_LENGTH, FIRSTNAME_MAX_LENGTH,
        INGREDIENT_NAME_MAX_LENGTH, LASTNAME_MAX_LENGTH, MEASUREMENT_UNIT_MAX_LENGTH,
        PASSWORD_MIN_LENGTH, RECIPE_NAME_MAX_LENGTH, SLUG_MAX_LENGTH, TAGNAME_MAX_LENGTH,
        USERNAME_MAX_LENGTH, WORD_MAX_LENGTH,
    },
    error::{TypeError, ValidationErrors, REQUIRED},
    form::{parse_integer, small_positive, Form},
    media::{decode_image, DecodedImage},
    moderation::obscenity::ForbiddenWords,
    schema::{IngredientAmount, NewTag, NewUser, RecipeData, Uuid},
};

pub const DUPLICATE_TAGS: &str = "Tags must be unique.";
pub const MISSING_TAG: &str = "Tag does not exist.";
pub const DUPLICATE_INGREDIENTS: &str = "Ingredients must be unique.";
pub const MISSING_INGREDIENT: &str = "Ingredient does not exist.";
pub const EMAIL_TAKEN: &str = "A user with that email already exists.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const WRONG_PASSWORD: &str = "Invalid password.";

fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("static pattern"))
}

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    pattern(&PATTERN, r"^[\w.@+-]+$")
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    pattern(&PATTERN, r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
}

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    pattern(&PATTERN, r"^[-a-zA-Z0-9_]+$")
}

fn color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    pattern(&PATTERN, r"^#[0-9A-Fa-f]{6}$")
}

pub fn max_length(value: String, max: usize) -> Result<String, TypeError> {
    if value.chars().count() > max {
        return Err(TypeError::new(&format!(
            "Ensure this field has no more than {max} characters."
        )));
    }
    Ok(value)
}

pub fn email(value: String) -> Result<String, TypeError> {
    let value = max_length(value.trim().to_string(), EMAIL_MAX_LENGTH)?;
    if !email_pattern().is_match(&value) {
        return Err(TypeError::new("Enter a valid email address."));
    }
    Ok(value)
}

pub fn username(value: String, words: &ForbiddenWords) -> Result<String, TypeError> {
    let value = max_length(value, USERNAME_MAX_LENGTH)?;
    if !username_pattern().is_match(&value) {
        return Err(TypeError::new(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    words.validate_no_obscenities(&value)?;
    Ok(value)
}

pub fn personal_name(value: String, max: usize, words: &ForbiddenWords) -> Result<String, TypeError> {
    let value = max_length(value, max)?;
    words.validate_no_obscenities(&value)?;
    Ok(value)
}

pub fn password(value: String) -> Result<String, TypeError> {
    if value.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(TypeError::new(&format!(
            "This password is too short. It must contain at least {PASSWORD_MIN_LENGTH} characters."
        )));
    }
    if value.chars().all(|c| c.is_ascii_digit()) {
        return Err(TypeError::new("This password is entirely numeric."));
    }
    Ok(value)
}

/// Registration fields. The returned password is still plain text.
pub fn registration(
    form: &Form,
    words: &ForbiddenWords,
    errors: &mut ValidationErrors,
) -> Option<NewUser> {
    let email = errors.check("email", form.get_str("email").and_then(email));
    let username = errors.check(
        "username",
        form.get_str("username").and_then(|v| username(v, words)),
    );
    let first_name = errors.check(
        "first_name",
        form.get_str("first_name")
            .and_then(|v| personal_name(v, FIRSTNAME_MAX_LENGTH, words)),
    );
    let last_name = errors.check(
        "last_name",
        form.get_str("last_name")
            .and_then(|v| personal_name(v, LASTNAME_MAX_LENGTH, words)),
    );
    let password = errors.check("password", form.get_str("password").and_then(password));

    Some(NewUser {
        email: email?,
        username: username?,
        first_name: first_name?,
        last_name: last_name?,
        password: password?,
    })
}

/// `(current_password, new_password)`
pub fn password_change(form: &Form, errors: &mut ValidationErrors) -> Option<(String, String)> {
    let current = errors.check("current_password", form.get_str("current_password"));
    let new = errors.check(
        "new_password",
        form.get_str("new_password").and_then(password),
    );

    Some((current?, new?))
}

pub fn tag(form: &Form, errors: &mut ValidationErrors) -> Option<NewTag> {
    let name = errors.check(
        "name",
        form.get_str("name")
            .and_then(|v| max_length(v, TAGNAME_MAX_LENGTH)),
    );
    let color = errors.check(
        "color",
        form.get_optional_str("color").and_then(|v| {
            let v = v.unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string());
            let v = max_length(v, COLOR_CODE_MAX_LENGTH)?;
            if !color_pattern().is_match(&v) {
                return Err(TypeError::new("Enter a valid hex color, e.g. #49B64E."));
            }
            Ok(v.to_uppercase())
        }),
    );
    let slug = errors.check(
        "slug",
        form.get_str("slug").and_then(|v| {
            let v = max_length(v, SLUG_MAX_LENGTH)?;
            if !slug_pattern().is_match(&v) {
                return Err(TypeError::new(
                    "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
                ));
            }
            Ok(v)
        }),
    );

    Some(NewTag {
        name: name?,
        color: color?,
        slug: slug?,
    })
}

/// `(name, measurement_unit)`
pub fn ingredient(form: &Form, errors: &mut ValidationErrors) -> Option<(String, String)> {
    let name = errors.check(
        "name",
        form.get_str("name")
            .and_then(|v| max_length(v.trim().to_string(), INGREDIENT_NAME_MAX_LENGTH)),
    );
    let unit = errors.check(
        "measurement_unit",
        form.get_str("measurement_unit")
            .and_then(|v| max_length(v.trim().to_string(), MEASUREMENT_UNIT_MAX_LENGTH)),
    );

    Some((name?, unit?))
}

pub fn forbidden_word(form: &Form, errors: &mut ValidationErrors) -> Option<String> {
    errors.check(
        "word",
        form.get_str("word").and_then(|v| {
            let v = max_length(v.trim().to_lowercase(), WORD_MAX_LENGTH)?;
            if v.split_whitespace().count() > 1 {
                return Err(TypeError::new("Enter a single word."));
            }
            Ok(v)
        }),
    )
}

fn tag_ids(values: Vec<Value>) -> Result<Vec<Uuid>, TypeError> {
    let mut ids = Vec::with_capacity(values.len());
    for value in values.iter() {
        let id = parse_integer(value)?;
        let id = Uuid::try_from(id).map_err(|_| TypeError::new(MISSING_TAG))?;
        if ids.contains(&id) {
            return Err(TypeError::new(DUPLICATE_TAGS));
        }
        ids.push(id);
    }
    Ok(ids)
}

fn ingredient_amounts(values: Vec<Value>) -> Result<Vec<IngredientAmount>, TypeError> {
    let mut parts: Vec<IngredientAmount> = Vec::with_capacity(values.len());
    for value in values.into_iter() {
        let Value::Object(object) = value else {
            return Err(TypeError::new("Expected an object with id and amount."));
        };
        let part = Form::from_data(object.into_iter().collect());

        let id = part
            .get_number("id")
            .and_then(|id| Uuid::try_from(id).map_err(|_| TypeError::new(MISSING_INGREDIENT)))?;
        let amount = part.get_number("amount").and_then(small_positive)?;

        if parts.iter().any(|p| p.id == id) {
            return Err(TypeError::new(DUPLICATE_INGREDIENTS));
        }
        parts.push(IngredientAmount { id, amount });
    }
    Ok(parts)
}

/// Validated recipe body. `image` is decoded but not stored yet.
#[derive(Debug, Clone)]
pub struct RecipeInput {
    pub data: RecipeData,
    pub image: Option<DecodedImage>,
}

/// Recipe fields for creation (`partial == false`) or update. Tags and ingredients
/// are required either way.
pub fn recipe(
    form: &Form,
    words: &ForbiddenWords,
    partial: bool,
    errors: &mut ValidationErrors,
) -> Option<RecipeInput> {
    let tags = errors.check("tags", form.get_list("tags").and_then(tag_ids));
    let ingredients = errors.check(
        "ingredients",
        form.get_list("ingredients").and_then(ingredient_amounts),
    );

    let optional = |key: &str| -> Result<Option<String>, TypeError> {
        match partial {
            true => form.get_optional_str(key),
            false => form.get_str(key).map(Some),
        }
    };

    let image = errors.check(
        "image",
        optional("image").and_then(|v| v.map(|v| decode_image(&v)).transpose()),
    );
    let name = errors.check(
        "name",
        optional("name").and_then(|v| {
            v.map(|v| -> Result<String, TypeError> {
                let v = max_length(v, RECIPE_NAME_MAX_LENGTH)?;
                words.validate_no_obscenities(&v)?;
                Ok(v)
            })
            .transpose()
        }),
    );
    let text = errors.check(
        "text",
        optional("text").and_then(|v| {
            v.map(|v| -> Result<String, TypeError> {
                words.validate_text(&v)?;
                Ok(v)
            })
            .transpose()
        }),
    );

    let cooking_time = match (partial, form.contains("cooking_time")) {
        (true, false) => Some(None),
        (false, false) => {
            errors.add("cooking_time", REQUIRED);
            None
        }
        (_, true) => errors
            .check(
                "cooking_time",
                form.get_number("cooking_time").and_then(small_positive),
            )
            .map(Some),
    };

    Some(RecipeInput {
        data: RecipeData {
            name: name?,
            image: None,
            text: text?,
            cooking_time: cooking_time?,
            tags: tags?,
            ingredients: ingredients?,
        },
        image: image?,
    })
}
