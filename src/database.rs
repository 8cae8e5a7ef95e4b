use crate::model::*;
use sled::transaction::{
    abort, ConflictableTransactionError, TransactionError, Transactional,
};

fn serialize_id(id: u64) -> [u8; 8] {
    id.to_le_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> Result<u64, DbError> {
    id.as_ref()
        .try_into()
        .map(u64::from_le_bytes)
        .map_err(|_| DbError::Corrupt("id is not 8 bytes"))
}

// Big endian so that a prefix scan over one owner yields ascending movie ids.
fn owner_key(owner: UserId, movie: MovieId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&owner.to_be_bytes());
    key[8..].copy_from_slice(&movie.to_be_bytes());
    key
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("corrupt database: {0}")]
    Corrupt(&'static str),
    #[error("no user with id {0}")]
    UnknownOwner(UserId),
}

fn abort_with<E: Into<DbError>>(err: E) -> ConflictableTransactionError<DbError> {
    ConflictableTransactionError::Abort(err.into())
}

fn flatten(err: TransactionError<DbError>) -> DbError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => DbError::Storage(e),
    }
}

pub trait UserDb {
    type Error;
    /// Returns `None` if the username is already taken.
    fn add_user(&self, user: &User) -> Result<Option<UserId>, Self::Error>;
    #[allow(dead_code)]
    fn get_user(&self, id: UserId) -> Result<Option<User>, Self::Error>;
    fn get_user_by_username(&self, username: &str)
        -> Result<Option<(UserId, User)>, Self::Error>;
    /// Removes the user together with every movie they own.
    #[allow(dead_code)] // storage-level cascade, no route deletes users
    fn remove_user(&self, id: UserId) -> Result<bool, Self::Error>;
}

pub trait MovieDb {
    type Error;
    fn add_movie(&self, movie: &Movie) -> Result<MovieId, Self::Error>;
    fn get_movie(&self, id: MovieId) -> Result<Option<Movie>, Self::Error>;
    fn get_movies_by_owner(&self, owner: UserId) -> Result<Vec<(MovieId, Movie)>, Self::Error>;
    /// Overwrites the fields of `id` only if it is owned by `owner`.
    fn update_movie_owned(
        &self,
        id: MovieId,
        owner: UserId,
        fields: &MovieFields,
    ) -> Result<Option<Movie>, Self::Error>;
    /// Removes `id` only if it is owned by `owner`.
    fn remove_movie_owned(&self, id: MovieId, owner: UserId)
        -> Result<Option<Movie>, Self::Error>;
}

const USERS: &[u8] = b"users";
const USERS_USERNAME: &[u8] = b"USERS_USERNAME";
const MOVIES: &[u8] = b"movies";
const MOVIES_OWNER: &[u8] = b"MOVIES_OWNER";

impl UserDb for sled::Db {
    type Error = DbError;

    fn add_user(&self, user: &User) -> Result<Option<UserId>, DbError> {
        let users = self.open_tree(USERS)?;
        let users_username = self.open_tree(USERS_USERNAME)?;
        let id = self.generate_id()?;
        let encoded = bincode::serialize(user)?;
        if let Err(err) = (&users, &users_username).transaction(|(users, users_username)| {
            users.insert(&serialize_id(id)[..], encoded.clone())?;
            if users_username
                .insert(user.username.as_bytes(), &serialize_id(id)[..])?
                .is_some()
            {
                return abort(());
            }
            Ok(())
        }) {
            match err {
                TransactionError::Storage(e) => return Err(e.into()),
                TransactionError::Abort(()) => return Ok(None),
            };
        }
        Ok(Some(id))
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>, DbError> {
        let users = self.open_tree(USERS)?;
        match users.get(serialize_id(id))? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<(UserId, User)>, DbError> {
        let users_username = self.open_tree(USERS_USERNAME)?;
        let users = self.open_tree(USERS)?;
        if let Some(id) = users_username.get(username)? {
            let data = users
                .get(&id)?
                .ok_or(DbError::Corrupt("bad index users_username"))?;
            Ok(Some((deserialize_id(id)?, bincode::deserialize(&data)?)))
        } else {
            Ok(None)
        }
    }

    fn remove_user(&self, id: UserId) -> Result<bool, DbError> {
        let user = match self.get_user(id)? {
            Some(user) => user,
            None => return Ok(false),
        };
        let users = self.open_tree(USERS)?;
        let users_username = self.open_tree(USERS_USERNAME)?;
        let movies = self.open_tree(MOVIES)?;
        let movies_owner = self.open_tree(MOVIES_OWNER)?;
        (&users, &users_username)
            .transaction(|(users, users_username)| {
                users.remove(&serialize_id(id)[..])?;
                users_username.remove(user.username.as_bytes())?;
                Ok::<_, ConflictableTransactionError<DbError>>(())
            })
            .map_err(flatten)?;
        // add_movie checks the owner inside its transaction, so once the user
        // is gone the owner index can only shrink and this sweep terminates.
        let mut removed = 0;
        loop {
            let owned = movies_owner
                .scan_prefix(id.to_be_bytes())
                .keys()
                .collect::<sled::Result<Vec<_>>>()?;
            if owned.is_empty() {
                break;
            }
            (&movies, &movies_owner)
                .transaction(|(movies, movies_owner)| {
                    for key in &owned {
                        let movie_id = key[8..]
                            .try_into()
                            .map(u64::from_be_bytes)
                            .map_err(|_| abort_with(DbError::Corrupt("bad index movies_owner")))?;
                        movies.remove(&serialize_id(movie_id)[..])?;
                        movies_owner.remove(&key[..])?;
                    }
                    Ok::<_, ConflictableTransactionError<DbError>>(())
                })
                .map_err(flatten)?;
            removed += owned.len();
        }
        log::debug!("removed user {} and {} movies", id, removed);
        Ok(true)
    }
}

impl MovieDb for sled::Db {
    type Error = DbError;

    fn add_movie(&self, movie: &Movie) -> Result<MovieId, DbError> {
        let users = self.open_tree(USERS)?;
        let movies = self.open_tree(MOVIES)?;
        let movies_owner = self.open_tree(MOVIES_OWNER)?;
        let id = self.generate_id()?;
        let encoded = bincode::serialize(movie)?;
        (&users, &movies, &movies_owner)
            .transaction(|(users, movies, movies_owner)| {
                if users.get(&serialize_id(movie.created_by)[..])?.is_none() {
                    return Err(abort_with(DbError::UnknownOwner(movie.created_by)));
                }
                movies.insert(&serialize_id(id)[..], encoded.clone())?;
                let index_key = owner_key(movie.created_by, id);
                movies_owner.insert(&index_key[..], Vec::<u8>::new())?;
                Ok::<_, ConflictableTransactionError<DbError>>(())
            })
            .map_err(flatten)?;
        Ok(id)
    }

    fn get_movie(&self, id: MovieId) -> Result<Option<Movie>, DbError> {
        let movies = self.open_tree(MOVIES)?;
        match movies.get(serialize_id(id))? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    fn get_movies_by_owner(&self, owner: UserId) -> Result<Vec<(MovieId, Movie)>, DbError> {
        let movies = self.open_tree(MOVIES)?;
        let movies_owner = self.open_tree(MOVIES_OWNER)?;
        let mut ret = Vec::new();
        for key in movies_owner.scan_prefix(owner.to_be_bytes()).keys() {
            let key = key?;
            let id = key[8..]
                .try_into()
                .map(u64::from_be_bytes)
                .map_err(|_| DbError::Corrupt("bad index movies_owner"))?;
            let data = movies
                .get(serialize_id(id))?
                .ok_or(DbError::Corrupt("bad index movies_owner"))?;
            ret.push((id, bincode::deserialize(&data)?));
        }
        Ok(ret)
    }

    fn update_movie_owned(
        &self,
        id: MovieId,
        owner: UserId,
        fields: &MovieFields,
    ) -> Result<Option<Movie>, DbError> {
        let movies = self.open_tree(MOVIES)?;
        movies
            .transaction(|movies| {
                let data = match movies.get(&serialize_id(id)[..])? {
                    Some(data) => data,
                    None => return Ok(None),
                };
                let mut movie: Movie = bincode::deserialize(&data).map_err(abort_with)?;
                if movie.created_by != owner {
                    return Ok(None);
                }
                movie.fields = fields.clone();
                let encoded = bincode::serialize(&movie).map_err(abort_with)?;
                movies.insert(&serialize_id(id)[..], encoded)?;
                Ok(Some(movie))
            })
            .map_err(flatten)
    }

    fn remove_movie_owned(&self, id: MovieId, owner: UserId) -> Result<Option<Movie>, DbError> {
        let movies = self.open_tree(MOVIES)?;
        let movies_owner = self.open_tree(MOVIES_OWNER)?;
        (&movies, &movies_owner)
            .transaction(|(movies, movies_owner)| {
                let data = match movies.get(&serialize_id(id)[..])? {
                    Some(data) => data,
                    None => return Ok(None),
                };
                let movie: Movie = bincode::deserialize(&data).map_err(abort_with)?;
                if movie.created_by != owner {
                    return Ok(None);
                }
                movies.remove(&serialize_id(id)[..])?;
                movies_owner.remove(&owner_key(owner, id)[..])?;
                Ok(Some(movie))
            })
            .map_err(flatten)
    }
}
