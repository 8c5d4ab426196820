use serde_json::{Map, Value};

use super::error::{ApiError, FieldErrors};
use crate::constants::{
    NAME_MAX_LENGTH, PASSWORD_MIN_LENGTH, PRICE_DECIMAL_PLACES, PRICE_MAX_DIGITS,
};

pub type FormData = Map<String, Value>;

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";
const NOT_STRING: &str = "Not a valid string.";
const NOT_INTEGER: &str = "A valid integer is required.";
const NOT_NUMBER: &str = "A valid number is required.";
const NOT_EMAIL: &str = "Enter a valid email address.";

/// A JSON object being validated field by field.
///
/// Every getter records its own errors and returns `None` for a missing or
/// invalid value; `finish` turns the collected errors into one 400 response.
/// In partial mode (PATCH) a missing field is not an error.
pub struct Form {
    inner: FormData,
    partial: bool,
    errors: FieldErrors,
}

impl Form {
    pub fn from_data(data: FormData, partial: bool) -> Self {
        Self {
            inner: data,
            partial,
            errors: FieldErrors::new(),
        }
    }

    pub fn error(&mut self, key: &str, message: &str) {
        self.errors.add(key, message);
    }

    pub fn finish(self) -> Result<(), ApiError> {
        self.errors.into_result(())
    }

    fn take(&mut self, key: &str, required: bool) -> Option<Value> {
        match self.inner.remove(key) {
            Some(Value::Null) => {
                self.error(key, NOT_NULL);
                None
            }
            Some(value) => Some(value),
            None => {
                if required && !self.partial {
                    self.error(key, REQUIRED);
                }
                None
            }
        }
    }

    fn text(&mut self, key: &str, value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => {
                self.error(key, NOT_STRING);
                None
            }
        }
    }

    fn check_length(&mut self, key: &str, value: &str, min: usize, max: usize) -> bool {
        let length = value.chars().count();
        if length < min {
            self.error(
                key,
                &format!("Ensure this field has at least {min} characters."),
            );
            return false;
        }
        if length > max {
            self.error(
                key,
                &format!("Ensure this field has no more than {max} characters."),
            );
            return false;
        }
        true
    }

    /// A required, non-blank string of at most `max_length` characters.
    pub fn get_str(&mut self, key: &str, max_length: usize) -> Option<String> {
        let value = self.take(key, true)?;
        let value = self.text(key, value)?;

        if value.is_empty() {
            self.error(key, NOT_BLANK);
            return None;
        }
        self.check_length(key, &value, 0, max_length)
            .then_some(value)
    }

    /// An optional string that may be blank.
    pub fn get_optional_str(&mut self, key: &str, max_length: Option<usize>) -> Option<String> {
        let value = self.take(key, false)?;
        let value = self.text(key, value)?;

        self.check_length(key, &value, 0, max_length.unwrap_or(usize::MAX))
            .then_some(value)
    }

    pub fn get_int(&mut self, key: &str) -> Option<i32> {
        let value = self.take(key, true)?;
        let parsed = match &value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => parse_integer(s),
            _ => None,
        };

        match parsed.and_then(|n| i32::try_from(n).ok()) {
            Some(n) => Some(n),
            None => {
                self.error(key, NOT_INTEGER);
                None
            }
        }
    }

    /// A decimal with at most `PRICE_MAX_DIGITS` digits, `PRICE_DECIMAL_PLACES`
    /// of them after the point. Returned in its textual form.
    pub fn get_decimal(&mut self, key: &str) -> Option<String> {
        let value = self.take(key, true)?;
        let raw = match value {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.trim().to_string(),
            _ => {
                self.error(key, NOT_NUMBER);
                return None;
            }
        };

        match check_decimal(&raw, PRICE_MAX_DIGITS, PRICE_DECIMAL_PLACES) {
            Ok(()) => Some(raw),
            Err(message) => {
                self.error(key, &message);
                None
            }
        }
    }

    /// A required email address, with the domain part lower-cased.
    pub fn get_email(&mut self, key: &str) -> Option<String> {
        let value = self.get_str(key, NAME_MAX_LENGTH)?;

        match normalize_email(&value) {
            Some(email) => Some(email),
            None => {
                self.error(key, NOT_EMAIL);
                None
            }
        }
    }

    pub fn get_password(&mut self, key: &str) -> Option<String> {
        let value = self.get_str(key, usize::MAX)?;

        self.check_length(key, &value, PASSWORD_MIN_LENGTH, usize::MAX)
            .then_some(value)
    }

    /// A list of `{"name": ...}` objects, as used for nested tags and ingredients.
    pub fn get_named_list(&mut self, key: &str) -> Option<Vec<String>> {
        let value = self.take(key, false)?;
        let items = match value {
            Value::Array(items) => items,
            other => {
                self.error(
                    key,
                    &format!(
                        "Expected a list of items but got type \"{}\".",
                        json_type(&other)
                    ),
                );
                return None;
            }
        };

        let mut names = Vec::with_capacity(items.len());
        let mut valid = true;
        for item in items {
            let mut nested = match item {
                Value::Object(data) => Form::from_data(data, false),
                _ => {
                    self.error(key, "Invalid data. Expected a dictionary.");
                    valid = false;
                    continue;
                }
            };

            let name = nested.get_str("name", NAME_MAX_LENGTH);
            for (field, messages) in nested.errors.iter() {
                for message in messages {
                    self.error(key, &format!("{field}: {message}"));
                }
            }

            match name {
                Some(name) => names.push(name),
                None => valid = false,
            }
        }

        valid.then_some(names)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

fn parse_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    // "12.0" and "12." are accepted as 12
    let raw = match raw.split_once('.') {
        Some((whole, zeros)) if zeros.chars().all(|c| c == '0') => whole,
        Some(_) => return None,
        None => raw,
    };
    raw.parse().ok()
}

pub fn check_decimal(raw: &str, max_digits: usize, decimal_places: usize) -> Result<(), String> {
    let unsigned = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    let well_formed = !(whole.is_empty() && fraction.is_empty())
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.chars().all(|c| c.is_ascii_digit());
    if !well_formed {
        return Err(NOT_NUMBER.to_string());
    }

    let significant = format!("{whole}{fraction}");
    let significant = significant.trim_start_matches('0').len();
    let decimals = fraction.len();
    let digits = significant.max(decimals);
    let whole_digits = digits - decimals;

    if digits > max_digits {
        return Err(format!(
            "Ensure that there are no more than {max_digits} digits in total."
        ));
    }
    if decimals > decimal_places {
        return Err(format!(
            "Ensure that there are no more than {decimal_places} decimal places."
        ));
    }
    if whole_digits > max_digits - decimal_places {
        return Err(format!(
            "Ensure that there are no more than {} digits before the decimal point.",
            max_digits - decimal_places
        ));
    }
    Ok(())
}

/// Lower-cases the domain part and checks the address has a plausible shape.
pub fn normalize_email(raw: &str) -> Option<String> {
    let (local, domain) = raw.trim().rsplit_once('@')?;

    let valid = !local.is_empty()
        && !local.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
        && !raw.chars().any(char::is_whitespace);
    if !valid {
        return None;
    }

    Some(format!("{local}@{}", domain.to_lowercase()))
}

/// Fields of a recipe create or update. For updates `None` leaves the column
/// untouched; for `tags` and `ingredients` it leaves the linked set untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipePayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<String>,
    pub link: Option<String>,
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<String>>,
}

impl RecipePayload {
    pub fn from_data(data: FormData, partial: bool) -> Result<Self, ApiError> {
        let mut form = Form::from_data(data, partial);

        let payload = Self {
            title: form.get_str("title", NAME_MAX_LENGTH),
            description: form.get_optional_str("description", None),
            time_minutes: form.get_int("time_minutes"),
            price: form.get_decimal("price"),
            link: form.get_optional_str("link", Some(NAME_MAX_LENGTH)),
            tags: form.get_named_list("tags"),
            ingredients: form.get_named_list("ingredients"),
        };

        form.finish()?;
        Ok(payload)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributePayload {
    pub name: Option<String>,
}

impl AttributePayload {
    pub fn from_data(data: FormData, partial: bool) -> Result<Self, ApiError> {
        let mut form = Form::from_data(data, partial);
        let payload = Self {
            name: form.get_str("name", NAME_MAX_LENGTH),
        };

        form.finish()?;
        Ok(payload)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPayload {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

impl UserPayload {
    pub fn from_data(data: FormData, partial: bool) -> Result<Self, ApiError> {
        let mut form = Form::from_data(data, partial);
        let payload = Self {
            email: form.get_email("email"),
            password: form.get_password("password"),
            name: form.get_str("name", NAME_MAX_LENGTH),
        };

        form.finish()?;
        Ok(payload)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenPayload {
    pub email: String,
    pub password: String,
}

impl TokenPayload {
    pub fn from_data(data: FormData) -> Result<Self, ApiError> {
        let mut form = Form::from_data(data, false);
        let email = form.get_str("email", NAME_MAX_LENGTH);
        // passwords are compared verbatim, never trimmed
        let password = match form.take("password", true) {
            Some(Value::String(password)) if !password.is_empty() => Some(password),
            Some(Value::String(_)) => {
                form.error("password", NOT_BLANK);
                None
            }
            Some(_) => {
                form.error("password", NOT_STRING);
                None
            }
            None => None,
        };

        form.finish()?;
        match (email, password) {
            (Some(email), Some(password)) => Ok(Self { email, password }),
            _ => Err(ApiError::Internal(String::from(
                "token payload validated without credentials",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> FormData {
        match value {
            Value::Object(map) => map,
            _ => panic!("test data must be an object"),
        }
    }

    fn field_errors(result: Result<impl std::fmt::Debug, ApiError>) -> FieldErrors {
        match result {
            Err(ApiError::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn recipe_without_title_is_rejected_on_title() {
        let errors = field_errors(RecipePayload::from_data(
            data(json!({ "time_minutes": 10, "price": "5.00" })),
            false,
        ));

        assert_eq!(errors.get("title"), Some(&[REQUIRED.to_string()][..]));
        assert!(!errors.contains("price"));
    }

    #[test]
    fn recipe_payload_accepts_full_body() {
        let payload = RecipePayload::from_data(
            data(json!({
                "title": "  Thai curry ",
                "time_minutes": "30",
                "price": 12.5,
                "tags": [{ "name": "Thai" }, { "name": "Dinner" }],
                "ingredients": [],
            })),
            false,
        )
        .unwrap();

        assert_eq!(payload.title.as_deref(), Some("Thai curry"));
        assert_eq!(payload.time_minutes, Some(30));
        assert_eq!(payload.price.as_deref(), Some("12.5"));
        assert_eq!(
            payload.tags,
            Some(vec![String::from("Thai"), String::from("Dinner")])
        );
        assert_eq!(payload.ingredients, Some(vec![]));
        assert_eq!(payload.description, None);
    }

    #[test]
    fn partial_payload_skips_missing_required_fields() {
        let payload =
            RecipePayload::from_data(data(json!({ "link": "https://example.com" })), true)
                .unwrap();

        assert_eq!(payload.title, None);
        assert_eq!(payload.link.as_deref(), Some("https://example.com"));
        assert_eq!(payload.tags, None);
    }

    #[test]
    fn blank_and_null_values_are_rejected() {
        let errors = field_errors(RecipePayload::from_data(
            data(json!({ "title": "   ", "time_minutes": null, "price": "1" })),
            true,
        ));

        assert_eq!(errors.get("title"), Some(&[NOT_BLANK.to_string()][..]));
        assert_eq!(
            errors.get("time_minutes"),
            Some(&[NOT_NULL.to_string()][..])
        );
    }

    #[test]
    fn nested_tags_must_be_named_objects() {
        let errors = field_errors(RecipePayload::from_data(
            data(json!({ "tags": "vegan" })),
            true,
        ));
        assert_eq!(
            errors.get("tags"),
            Some(&[String::from("Expected a list of items but got type \"str\".")][..])
        );

        let errors = field_errors(RecipePayload::from_data(
            data(json!({ "tags": [{ "name": "" }, 4] })),
            true,
        ));
        let messages = errors.get("tags").unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], "name: This field may not be blank.");
    }

    #[test]
    fn integers_follow_lenient_parsing() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer(" 42.00 "), Some(42));
        assert_eq!(parse_integer("42.5"), None);
        assert_eq!(parse_integer("forty"), None);

        let errors = field_errors(RecipePayload::from_data(
            data(json!({ "time_minutes": 2.5 })),
            true,
        ));
        assert_eq!(
            errors.get("time_minutes"),
            Some(&[NOT_INTEGER.to_string()][..])
        );
    }

    #[test]
    fn decimals_respect_digit_limits() {
        assert!(check_decimal("5.50", 5, 2).is_ok());
        assert!(check_decimal("999.99", 5, 2).is_ok());
        assert!(check_decimal("0.5", 5, 2).is_ok());
        assert!(check_decimal("-3", 5, 2).is_ok());
        assert!(check_decimal("007.25", 5, 2).is_ok());

        assert_eq!(
            check_decimal("1000", 5, 2).unwrap_err(),
            "Ensure that there are no more than 3 digits before the decimal point."
        );
        assert_eq!(
            check_decimal("1.555", 5, 2).unwrap_err(),
            "Ensure that there are no more than 2 decimal places."
        );
        assert_eq!(
            check_decimal("1234.56", 5, 2).unwrap_err(),
            "Ensure that there are no more than 5 digits in total."
        );
        assert_eq!(check_decimal("abc", 5, 2).unwrap_err(), NOT_NUMBER);
        assert_eq!(check_decimal(".", 5, 2).unwrap_err(), NOT_NUMBER);
        assert_eq!(check_decimal("NaN", 5, 2).unwrap_err(), NOT_NUMBER);
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(
            normalize_email("Test.User@EXAMPLE.com").as_deref(),
            Some("Test.User@example.com")
        );
        assert_eq!(normalize_email("no-at-sign"), None);
        assert_eq!(normalize_email("user@localhost"), None);
        assert_eq!(normalize_email("@example.com"), None);
        assert_eq!(normalize_email("a b@example.com"), None);
    }

    #[test]
    fn user_payload_enforces_password_length() {
        let errors = field_errors(UserPayload::from_data(
            data(json!({ "email": "test@example.com", "password": "pw", "name": "Test" })),
            false,
        ));

        assert_eq!(
            errors.get("password"),
            Some(&[String::from("Ensure this field has at least 5 characters.")][..])
        );
    }

    #[test]
    fn user_payload_partial_update() {
        let payload = UserPayload::from_data(data(json!({ "name": "Renamed" })), true).unwrap();
        assert_eq!(payload.name.as_deref(), Some("Renamed"));
        assert_eq!(payload.password, None);
        assert_eq!(payload.email, None);
    }

    #[test]
    fn token_payload_requires_both_credentials() {
        let errors = field_errors(TokenPayload::from_data(data(
            json!({ "email": "test@example.com", "password": "" }),
        )));
        assert_eq!(errors.get("password"), Some(&[NOT_BLANK.to_string()][..]));

        let payload = TokenPayload::from_data(data(
            json!({ "email": "test@example.com", "password": " secret " }),
        ))
        .unwrap();
        assert_eq!(payload.password, " secret ");
    }

    #[test]
    fn attribute_payload_limits_name_length() {
        let long = "x".repeat(NAME_MAX_LENGTH + 1);
        let errors = field_errors(AttributePayload::from_data(
            data(json!({ "name": long })),
            false,
        ));
        assert_eq!(
            errors.get("name"),
            Some(&[String::from("Ensure this field has no more than 255 characters.")][..])
        );
    }
}
