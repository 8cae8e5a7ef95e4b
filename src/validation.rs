//! Form schemas: each field has a name, a kind carrying its constraints, and
//! the message reported when the constraint is violated. Validation always
//! visits every field so the caller gets all errors at once.

use crate::model::MovieFields;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type FieldErrors = BTreeMap<&'static str, String>;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_DATE: &str = "Enter a valid date.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const POSTER_CONFLICT: &str =
    "Please either submit a file or check the clear checkbox, not both.";
pub const INVALID_USERNAME: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";

/// An accepted date layout. chrono's `%Y` takes any number of digits and a
/// sign, so the year component is checked separately.
struct DateFormat {
    pattern: &'static str,
    separator: char,
    year_first: bool,
    year_digits: usize,
}

const DATE_FORMATS: &[DateFormat] = &[
    DateFormat {
        pattern: "%Y-%m-%d",
        separator: '-',
        year_first: true,
        year_digits: 4,
    },
    DateFormat {
        pattern: "%m/%d/%Y",
        separator: '/',
        year_first: false,
        year_digits: 4,
    },
    DateFormat {
        pattern: "%m/%d/%y",
        separator: '/',
        year_first: false,
        year_digits: 2,
    },
];

impl DateFormat {
    fn parse(&self, value: &str) -> Option<NaiveDate> {
        let year = if self.year_first {
            value.split(self.separator).next()
        } else {
            value.rsplit(self.separator).next()
        }?;
        if year.len() != self.year_digits || !year.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        NaiveDate::parse_from_str(value, self.pattern)
            .ok()
            .filter(|date| (1..=9999).contains(&date.year()))
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

#[derive(Debug, Clone, Copy)]
pub enum Kind {
    Text { max_len: usize },
    Date,
    Image { max_len: usize },
    Username { max_len: usize },
    Email { max_len: usize },
    Password,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: Kind,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cleaned {
    Text(String),
    Date(NaiveDate),
    Empty,
}

impl Cleaned {
    fn into_text(self) -> String {
        match self {
            Cleaned::Text(s) => s,
            _ => String::new(),
        }
    }
}

fn too_long(max_len: usize, len: usize) -> String {
    format!(
        "Ensure this value has at most {} characters (it has {}).",
        max_len, len
    )
}

impl FieldRule {
    pub fn clean(&self, raw: &str) -> Result<Cleaned, String> {
        // Passwords are taken verbatim, everything else is trimmed.
        let value = match self.kind {
            Kind::Password => raw,
            _ => raw.trim(),
        };
        if value.is_empty() {
            return if self.required {
                Err(REQUIRED.to_owned())
            } else {
                Ok(Cleaned::Empty)
            };
        }
        let len = value.chars().count();
        match self.kind {
            Kind::Text { max_len } => {
                if len > max_len {
                    return Err(too_long(max_len, len));
                }
            }
            Kind::Date => {
                return DATE_FORMATS
                    .iter()
                    .find_map(|format| format.parse(value))
                    .map(Cleaned::Date)
                    .ok_or_else(|| INVALID_DATE.to_owned());
            }
            Kind::Image { max_len } => {
                if len > max_len {
                    return Err(format!(
                        "Ensure this filename has at most {} characters (it has {}).",
                        max_len, len
                    ));
                }
                if !is_image_reference(value) {
                    return Err(INVALID_IMAGE.to_owned());
                }
            }
            Kind::Username { max_len } => {
                if len > max_len {
                    return Err(too_long(max_len, len));
                }
                if !value
                    .chars()
                    .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
                {
                    return Err(INVALID_USERNAME.to_owned());
                }
            }
            Kind::Email { max_len } => {
                if len > max_len {
                    return Err(too_long(max_len, len));
                }
                match value.split_once('@') {
                    Some((local, domain))
                        if !local.is_empty()
                            && !domain.is_empty()
                            && !domain.contains('@')
                            && !value.contains(char::is_whitespace) => {}
                    _ => return Err(INVALID_EMAIL.to_owned()),
                }
            }
            Kind::Password => {}
        }
        Ok(Cleaned::Text(value.to_owned()))
    }
}

fn is_image_reference(value: &str) -> bool {
    if value.starts_with('/') || value.split('/').any(|segment| segment == "..") {
        return false;
    }
    match value.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && !stem.ends_with('/')
                && IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
        }
        None => false,
    }
}

pub struct Schema(pub &'static [FieldRule]);

impl Schema {
    /// Cleans every field in the schema, looking raw values up by name.
    pub fn clean<'a, F>(&self, raw: F) -> (BTreeMap<&'static str, Cleaned>, FieldErrors)
    where
        F: Fn(&str) -> &'a str,
    {
        let mut cleaned = BTreeMap::new();
        let mut errors = FieldErrors::new();
        for rule in self.0 {
            match rule.clean(raw(rule.name)) {
                Ok(value) => {
                    cleaned.insert(rule.name, value);
                }
                Err(message) => {
                    errors.insert(rule.name, message);
                }
            }
        }
        (cleaned, errors)
    }
}

pub const MOVIE_SCHEMA: Schema = Schema(&[
    FieldRule {
        name: "title",
        kind: Kind::Text { max_len: 200 },
        required: true,
    },
    FieldRule {
        name: "description",
        kind: Kind::Text { max_len: usize::MAX },
        required: false,
    },
    FieldRule {
        name: "release_date",
        kind: Kind::Date,
        required: true,
    },
    FieldRule {
        name: "genre",
        kind: Kind::Text { max_len: 100 },
        required: true,
    },
    FieldRule {
        name: "poster",
        kind: Kind::Image { max_len: 100 },
        required: false,
    },
]);

pub const REGISTRATION_SCHEMA: Schema = Schema(&[
    FieldRule {
        name: "username",
        kind: Kind::Username { max_len: 150 },
        required: true,
    },
    FieldRule {
        name: "email",
        kind: Kind::Email { max_len: 254 },
        required: false,
    },
    FieldRule {
        name: "password",
        kind: Kind::Password,
        required: true,
    },
]);

/// Movie form as submitted. The owner is not part of it.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct MovieForm {
    pub title: String,
    pub description: String,
    pub release_date: String,
    pub genre: String,
    pub poster: String,
    #[serde(rename = "poster-clear", skip_serializing_if = "Option::is_none")]
    pub poster_clear: Option<String>,
}

impl MovieForm {
    fn raw(&self, name: &str) -> &str {
        match name {
            "title" => &self.title,
            "description" => &self.description,
            "release_date" => &self.release_date,
            "genre" => &self.genre,
            "poster" => &self.poster,
            _ => "",
        }
    }

    fn clear_poster(&self) -> bool {
        matches!(self.poster_clear.as_deref(), Some("on" | "true" | "1"))
    }

    /// Validates the form. `current_poster` is the stored poster when editing;
    /// a blank poster keeps it unless the clear flag is set.
    pub fn clean(&self, current_poster: Option<&str>) -> Result<MovieFields, FieldErrors> {
        let (mut cleaned, mut errors) = MOVIE_SCHEMA.clean(|name| self.raw(name));
        let clear = self.clear_poster();
        let poster = match cleaned.remove("poster") {
            Some(Cleaned::Text(_)) if clear => {
                errors.insert("poster", POSTER_CONFLICT.to_owned());
                None
            }
            Some(Cleaned::Text(poster)) => Some(poster),
            _ if clear => None,
            _ => current_poster.map(str::to_owned),
        };
        if !errors.is_empty() {
            return Err(errors);
        }
        let release_date = match cleaned.remove("release_date") {
            Some(Cleaned::Date(date)) => date,
            _ => {
                errors.insert("release_date", INVALID_DATE.to_owned());
                return Err(errors);
            }
        };
        let mut text = |name: &str| {
            cleaned
                .remove(name)
                .map(Cleaned::into_text)
                .unwrap_or_default()
        };
        Ok(MovieFields {
            title: text("title"),
            description: text("description"),
            release_date,
            genre: text("genre"),
            poster,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegistrationForm {
    pub fn clean(&self) -> Result<Registration, FieldErrors> {
        let (mut cleaned, errors) = REGISTRATION_SCHEMA.clean(|name| match name {
            "username" => self.username.as_str(),
            "email" => self.email.as_str(),
            "password" => self.password.as_str(),
            _ => "",
        });
        if !errors.is_empty() {
            return Err(errors);
        }
        let mut text = |name: &str| {
            cleaned
                .remove(name)
                .map(Cleaned::into_text)
                .unwrap_or_default()
        };
        Ok(Registration {
            username: text("username"),
            email: text("email"),
            password: text("password"),
        })
    }
}
