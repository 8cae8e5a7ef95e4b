use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type MovieId = u64;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Everything about a movie its owner may change.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MovieFields {
    pub title: String,
    pub description: String,
    pub release_date: NaiveDate,
    pub genre: String,
    pub poster: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Movie {
    pub created_by: UserId,
    pub fields: MovieFields,
}

/// The authenticated user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Serialize, Debug)]
pub struct MovieView {
    pub id: MovieId,
    pub title: String,
    pub description: String,
    pub release_date: NaiveDate,
    pub genre: String,
    pub poster: Option<String>,
    pub created_by: String,
}

impl MovieView {
    pub fn new(id: MovieId, movie: Movie, owner: &Caller) -> Self {
        let MovieFields {
            title,
            description,
            release_date,
            genre,
            poster,
        } = movie.fields;
        MovieView {
            id,
            title,
            description,
            release_date,
            genre,
            poster,
            created_by: owner.username.clone(),
        }
    }
}
