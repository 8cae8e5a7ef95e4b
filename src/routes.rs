use crate::auth::{self, Hasher};
use crate::error::CatalogError;
use crate::model::*;
use crate::service::{self, DeleteOutcome, DeleteStep};
use crate::validation::{MovieForm, RegistrationForm};
use actix_identity::Identity;
use actix_web::{http::header, web, HttpResponse};
use serde::{Deserialize, Serialize};

type Db = web::Data<sled::Db>;

fn caller(id: &Identity, db: &Db) -> Result<Caller, CatalogError> {
    auth::current_caller(db.get_ref(), id.identity().as_deref())
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

#[derive(Serialize)]
struct HomeView {
    user: Option<String>,
}

async fn index(id: Identity, db: Db) -> Result<HttpResponse, CatalogError> {
    let user = match caller(&id, &db) {
        Ok(caller) => Some(caller.username),
        Err(CatalogError::AuthenticationRequired) => None,
        Err(err) => return Err(err),
    };
    Ok(HttpResponse::Ok().json(HomeView { user }))
}

#[derive(Serialize)]
struct Registered {
    id: UserId,
    username: String,
}

async fn register(
    form: web::Form<RegistrationForm>,
    db: Db,
    hasher: web::Data<Hasher>,
) -> Result<HttpResponse, CatalogError> {
    let user = auth::register(db.get_ref(), **hasher, &form)?;
    Ok(HttpResponse::Created().json(Registered {
        id: user.user_id,
        username: user.username,
    }))
}

#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
struct LoginParams {
    username: String,
    password: String,
}

async fn login_post(
    params: web::Form<LoginParams>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, CatalogError> {
    let user = auth::authenticate(db.get_ref(), &params.username, &params.password)?;
    id.remember(user.username);
    Ok(redirect("/movies/"))
}

async fn logout(id: Identity) -> HttpResponse {
    id.forget();
    redirect("/")
}

async fn movie_list(id: Identity, db: Db) -> Result<HttpResponse, CatalogError> {
    let caller = caller(&id, &db)?;
    let movies = service::list(db.get_ref(), &caller)?
        .into_iter()
        .map(|(movie_id, movie)| MovieView::new(movie_id, movie, &caller))
        .collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(movies))
}

async fn movie_create(
    form: web::Form<MovieForm>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, CatalogError> {
    let caller = caller(&id, &db)?;
    let (movie_id, movie) = service::create(db.get_ref(), &caller, &form)?;
    Ok(HttpResponse::Created()
        .insert_header((header::LOCATION, format!("/movies/{}/edit/", movie_id)))
        .json(MovieView::new(movie_id, movie, &caller)))
}

async fn movie_edit(
    path: web::Path<MovieId>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, CatalogError> {
    let caller = caller(&id, &db)?;
    let movie_id = path.into_inner();
    let movie = service::read_for_edit(db.get_ref(), &caller, movie_id)?;
    Ok(HttpResponse::Ok().json(MovieView::new(movie_id, movie, &caller)))
}

async fn movie_update(
    path: web::Path<MovieId>,
    form: web::Form<MovieForm>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, CatalogError> {
    let caller = caller(&id, &db)?;
    let movie_id = path.into_inner();
    let movie = service::update(db.get_ref(), &caller, movie_id, &form)?;
    Ok(HttpResponse::Ok().json(MovieView::new(movie_id, movie, &caller)))
}

async fn delete_movie(
    path: web::Path<MovieId>,
    id: Identity,
    db: Db,
    step: DeleteStep,
) -> Result<HttpResponse, CatalogError> {
    let caller = caller(&id, &db)?;
    let movie_id = path.into_inner();
    match service::delete(db.get_ref(), &caller, movie_id, step)? {
        DeleteOutcome::Pending(movie) => {
            Ok(HttpResponse::Ok().json(MovieView::new(movie_id, movie, &caller)))
        }
        DeleteOutcome::Deleted(_) => Ok(redirect("/movies/")),
    }
}

async fn movie_delete(
    path: web::Path<MovieId>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, CatalogError> {
    delete_movie(path, id, db, DeleteStep::Preview).await
}

async fn movie_delete_post(
    path: web::Path<MovieId>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, CatalogError> {
    delete_movie(path, id, db, DeleteStep::Confirm).await
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/register", web::post().to(register))
        .route("/login", web::post().to(login_post))
        .route("/logout", web::get().to(logout))
        .route("/movies/", web::get().to(movie_list))
        .route("/movies/create/", web::post().to(movie_create))
        .route("/movies/{id}/edit/", web::get().to(movie_edit))
        .route("/movies/{id}/edit/", web::post().to(movie_update))
        .route("/movies/{id}/delete/", web::get().to(movie_delete))
        .route("/movies/{id}/delete/", web::post().to(movie_delete_post));
}
