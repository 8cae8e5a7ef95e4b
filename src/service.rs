//! Movie operations on behalf of a caller. Every read or write of a single
//! movie goes through [`load_owned`], so a movie that belongs to someone else
//! looks exactly like one that does not exist.

use crate::database::MovieDb;
use crate::error::CatalogError;
use crate::model::*;
use crate::validation::MovieForm;
use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeleteStep {
    /// Show what would be deleted, change nothing.
    Preview,
    Confirm,
}

#[derive(Debug, PartialEq)]
pub enum DeleteOutcome {
    Pending(Movie),
    Deleted(Movie),
}

pub fn load_owned<D>(db: &D, caller: &Caller, id: MovieId) -> Result<Movie, CatalogError>
where
    D: MovieDb,
    CatalogError: From<D::Error>,
{
    match db.get_movie(id)? {
        Some(movie) if movie.created_by == caller.user_id => Ok(movie),
        Some(_) => {
            debug!("{} asked for movie {} it does not own", caller.username, id);
            Err(CatalogError::NotFound)
        }
        None => Err(CatalogError::NotFound),
    }
}

pub fn list<D>(db: &D, caller: &Caller) -> Result<Vec<(MovieId, Movie)>, CatalogError>
where
    D: MovieDb,
    CatalogError: From<D::Error>,
{
    Ok(db.get_movies_by_owner(caller.user_id)?)
}

pub fn create<D>(
    db: &D,
    caller: &Caller,
    form: &MovieForm,
) -> Result<(MovieId, Movie), CatalogError>
where
    D: MovieDb,
    CatalogError: From<D::Error>,
{
    let fields = form
        .clean(None)
        .map_err(|errors| CatalogError::invalid(errors, form))?;
    let movie = Movie {
        created_by: caller.user_id,
        fields,
    };
    let id = db.add_movie(&movie)?;
    info!("{} created movie {} {:?}", caller.username, id, movie.fields.title);
    Ok((id, movie))
}

pub fn read_for_edit<D>(db: &D, caller: &Caller, id: MovieId) -> Result<Movie, CatalogError>
where
    D: MovieDb,
    CatalogError: From<D::Error>,
{
    load_owned(db, caller, id)
}

pub fn update<D>(
    db: &D,
    caller: &Caller,
    id: MovieId,
    form: &MovieForm,
) -> Result<Movie, CatalogError>
where
    D: MovieDb,
    CatalogError: From<D::Error>,
{
    let current = load_owned(db, caller, id)?;
    let fields = form
        .clean(current.fields.poster.as_deref())
        .map_err(|errors| CatalogError::invalid(errors, form))?;
    // The movie may have been deleted since it was loaded.
    let movie = db
        .update_movie_owned(id, caller.user_id, &fields)?
        .ok_or(CatalogError::NotFound)?;
    info!("{} updated movie {}", caller.username, id);
    Ok(movie)
}

pub fn delete<D>(
    db: &D,
    caller: &Caller,
    id: MovieId,
    step: DeleteStep,
) -> Result<DeleteOutcome, CatalogError>
where
    D: MovieDb,
    CatalogError: From<D::Error>,
{
    let movie = load_owned(db, caller, id)?;
    match step {
        DeleteStep::Preview => Ok(DeleteOutcome::Pending(movie)),
        DeleteStep::Confirm => {
            let movie = db
                .remove_movie_owned(id, caller.user_id)?
                .ok_or(CatalogError::NotFound)?;
            info!("{} deleted movie {}", caller.username, id);
            Ok(DeleteOutcome::Deleted(movie))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::UserDb;
    use chrono::NaiveDate;

    fn caller(db: &sled::Db, name: &str) -> Caller {
        let user = User {
            username: name.to_owned(),
            email: String::new(),
            password_hash: String::new(),
        };
        Caller {
            user_id: db.add_user(&user).unwrap().unwrap(),
            username: name.to_owned(),
        }
    }

    fn dune() -> MovieForm {
        MovieForm {
            title: "Dune".to_owned(),
            release_date: "2021-10-22".to_owned(),
            genre: "Sci-Fi".to_owned(),
            ..MovieForm::default()
        }
    }

    fn assert_not_found<T: std::fmt::Debug>(result: Result<T, CatalogError>) {
        match result {
            Err(CatalogError::NotFound) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn create_then_list() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let alice = caller(&db, "alice");
        let bob = caller(&db, "bob");
        let (id, _) = create(&db, &alice, &dune()).unwrap();

        let movies = list(&db, &alice).unwrap();
        assert_eq!(movies.len(), 1);
        let (listed_id, movie) = &movies[0];
        assert_eq!(*listed_id, id);
        assert_eq!(movie.created_by, alice.user_id);
        assert_eq!(movie.fields, dune().clean(None).unwrap());
        assert!(list(&db, &bob).unwrap().is_empty());
    }

    #[test]
    fn invalid_create_writes_nothing() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let alice = caller(&db, "alice");
        let mut form = dune();
        form.release_date = "someday".to_owned();
        match create(&db, &alice, &form) {
            Err(CatalogError::ValidationFailed { errors, submitted }) => {
                assert_eq!(errors.len(), 1);
                assert!(errors.contains_key("release_date"));
                assert_eq!(submitted["title"], "Dune");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(list(&db, &alice).unwrap().is_empty());
    }

    #[test]
    fn other_users_see_not_found() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let alice = caller(&db, "alice");
        let bob = caller(&db, "bob");
        let (id, movie) = create(&db, &alice, &dune()).unwrap();

        assert_not_found(read_for_edit(&db, &bob, id));
        let mut form = dune();
        form.title = "Mine now".to_owned();
        assert_not_found(update(&db, &bob, id, &form));
        assert_not_found(delete(&db, &bob, id, DeleteStep::Preview));
        assert_not_found(delete(&db, &bob, id, DeleteStep::Confirm));
        assert_not_found(read_for_edit(&db, &alice, id + 1000));

        assert_eq!(read_for_edit(&db, &alice, id).unwrap(), movie);
    }

    #[test]
    fn update_keeps_owner() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let alice = caller(&db, "alice");
        let (id, _) = create(&db, &alice, &dune()).unwrap();

        let form = MovieForm {
            title: "Dune: Part Two".to_owned(),
            description: "Paul joins the Fremen.".to_owned(),
            release_date: "03/01/2024".to_owned(),
            genre: "Sci-Fi".to_owned(),
            poster: "posters/dune2.png".to_owned(),
            poster_clear: None,
        };
        update(&db, &alice, id, &form).unwrap();
        let movie = read_for_edit(&db, &alice, id).unwrap();
        assert_eq!(movie.created_by, alice.user_id);
        assert_eq!(movie.fields.title, "Dune: Part Two");
        assert_eq!(
            movie.fields.release_date,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(movie.fields.poster.as_deref(), Some("posters/dune2.png"));

        // blank poster keeps the stored one
        let mut form = form;
        form.poster.clear();
        let movie = update(&db, &alice, id, &form).unwrap();
        assert_eq!(movie.fields.poster.as_deref(), Some("posters/dune2.png"));
    }

    #[test]
    fn invalid_update_leaves_record() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let alice = caller(&db, "alice");
        let (id, movie) = create(&db, &alice, &dune()).unwrap();
        let mut form = dune();
        form.genre.clear();
        assert!(matches!(
            update(&db, &alice, id, &form),
            Err(CatalogError::ValidationFailed { .. })
        ));
        assert_eq!(read_for_edit(&db, &alice, id).unwrap(), movie);
    }

    #[test]
    fn delete_needs_confirmation() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let alice = caller(&db, "alice");
        let (id, movie) = create(&db, &alice, &dune()).unwrap();

        assert_eq!(
            delete(&db, &alice, id, DeleteStep::Preview).unwrap(),
            DeleteOutcome::Pending(movie.clone())
        );
        assert_eq!(read_for_edit(&db, &alice, id).unwrap(), movie);

        assert_eq!(
            delete(&db, &alice, id, DeleteStep::Confirm).unwrap(),
            DeleteOutcome::Deleted(movie)
        );
        assert_not_found(read_for_edit(&db, &alice, id));
        assert_not_found(delete(&db, &alice, id, DeleteStep::Confirm));
    }
}
