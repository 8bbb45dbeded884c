//! In-process implementation of every store trait.
//!
//! One mutex guards all tables, so uniqueness and version checks happen
//! in the same critical section as the write.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use time::OffsetDateTime;

use crate::{
    error::StoreError,
    movies::{
        repo_types::{Movie, NewMovie},
        MovieStore,
    },
    permissions::{services::KNOWN_PERMISSIONS, PermissionStore, Permissions},
    tokens::{Scope, StoredToken, TokenStore},
    users::{repo_types::NewUser, User, UserStore},
};

#[derive(Default)]
struct Tables {
    next_user_id: i64,
    users: BTreeMap<i64, User>,
    tokens: HashMap<Vec<u8>, StoredToken>,
    grants: BTreeMap<i64, BTreeSet<String>>,
    next_movie_id: i64,
    movies: BTreeMap<i64, Movie>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn stored_tokens(&self) -> Vec<StoredToken> {
        self.tables.lock().tokens.values().cloned().collect()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut t = self.tables.lock();
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        t.next_user_id += 1;
        let row = User {
            id: t.next_user_id,
            created_at: OffsetDateTime::now_utc(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            activated: false,
            version: 1,
        };
        t.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let t = self.tables.lock();
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut t = self.tables.lock();
        if t
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::DuplicateEmail);
        }
        let Some(current) = t.users.get_mut(&user.id) else {
            return Err(StoreError::EditConflict);
        };
        if current.version != user.version {
            return Err(StoreError::EditConflict);
        }
        *current = User {
            version: user.version + 1,
            ..user.clone()
        };
        Ok(current.clone())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert(&self, token: &StoredToken) -> Result<(), StoreError> {
        self.tables
            .lock()
            .tokens
            .insert(token.hash.clone(), token.clone());
        Ok(())
    }

    async fn take(
        &self,
        hash: &[u8],
        scope: Scope,
        now: OffsetDateTime,
    ) -> Result<Option<i64>, StoreError> {
        let mut t = self.tables.lock();
        let live = t
            .tokens
            .get(hash)
            .is_some_and(|tok| tok.scope == scope && !tok.is_expired_at(now));
        if !live {
            return Ok(None);
        }
        Ok(t.tokens.remove(hash).map(|tok| tok.user_id))
    }

    async fn find_user(
        &self,
        hash: &[u8],
        scope: Scope,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let t = self.tables.lock();
        let user = t
            .tokens
            .get(hash)
            .filter(|tok| tok.scope == scope && !tok.is_expired_at(now))
            .and_then(|tok| t.users.get(&tok.user_id))
            .cloned();
        Ok(user)
    }

    async fn delete_all_for_user(&self, user_id: i64, scope: Scope) -> Result<u64, StoreError> {
        let mut t = self.tables.lock();
        let before = t.tokens.len();
        t.tokens
            .retain(|_, tok| !(tok.user_id == user_id && tok.scope == scope));
        Ok((before - t.tokens.len()) as u64)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let mut t = self.tables.lock();
        let before = t.tokens.len();
        t.tokens.retain(|_, tok| !tok.is_expired_at(now));
        Ok((before - t.tokens.len()) as u64)
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn for_user(&self, user_id: i64) -> Result<Permissions, StoreError> {
        let t = self.tables.lock();
        let codes: Vec<String> = t
            .grants
            .get(&user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        Ok(Permissions::from(codes))
    }

    async fn grant(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        let set = t.grants.entry(user_id).or_default();
        for code in codes.iter().filter(|c| KNOWN_PERMISSIONS.contains(*c)) {
            set.insert(code.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl MovieStore for MemoryStore {
    async fn insert(&self, movie: NewMovie) -> Result<Movie, StoreError> {
        let mut t = self.tables.lock();
        t.next_movie_id += 1;
        let row = Movie {
            id: t.next_movie_id,
            created_at: OffsetDateTime::now_utc(),
            title: movie.title,
            year: movie.year,
            runtime: movie.runtime,
            genres: movie.genres,
            version: 1,
        };
        t.movies.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get(&self, id: i64) -> Result<Option<Movie>, StoreError> {
        Ok(self.tables.lock().movies.get(&id).cloned())
    }

    async fn update(&self, movie: &Movie) -> Result<Movie, StoreError> {
        let mut t = self.tables.lock();
        let Some(current) = t.movies.get_mut(&movie.id) else {
            return Err(StoreError::EditConflict);
        };
        if current.version != movie.version {
            return Err(StoreError::EditConflict);
        }
        *current = Movie {
            version: movie.version + 1,
            ..movie.clone()
        };
        Ok(current.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.tables
            .lock()
            .movies
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Movie>, StoreError> {
        let t = self.tables.lock();
        Ok(t
            .movies
            .values()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
