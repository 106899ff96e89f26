use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: Option<String>,
    pub age: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserInput {
    pub name: Option<String>,
    pub age: Option<u32>,
}

struct Inner {
    users: Vec<User>,
    next_id: u64,
}

/// In-memory user store. Each server instance owns its own list; ids start
/// at 1 and are never reused.
#[derive(Clone)]
pub struct UserList {
    inner: Arc<Mutex<Inner>>,
}

impl Default for UserList {
    fn default() -> Self {
        Self::new()
    }
}

impl UserList {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                users: Vec::new(),
                next_id: 1,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add(&self, input: UserInput) -> User {
        let mut inner = self.lock();
        let user = User {
            id: inner.next_id,
            name: input.name,
            age: input.age,
        };
        inner.next_id += 1;
        inner.users.push(user.clone());
        user
    }

    pub fn all(&self) -> Vec<User> {
        self.lock().users.clone()
    }

    pub fn get(&self, id: u64) -> Option<User> {
        self.lock().users.iter().find(|u| u.id == id).cloned()
    }

    pub fn update(&self, id: u64, input: UserInput) -> Option<User> {
        let mut inner = self.lock();
        let user = inner.users.iter_mut().find(|u| u.id == id)?;
        user.name = input.name;
        user.age = input.age;
        Some(user.clone())
    }

    pub fn remove(&self, id: u64) -> bool {
        let mut inner = self.lock();
        let before = inner.users.len();
        inner.users.retain(|u| u.id != id);
        inner.users.len() != before
    }
}

pub fn router(list: UserList) -> Router {
    Router::new()
        .route("/addUser", post(add_user))
        .route("/getUsers", get(get_users))
        .route("/getUsers/{id}", get(get_user))
        .route("/updateUser/{id}", put(update_user))
        .route("/deleteUser/{id}", delete(delete_user))
        .with_state(list)
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "User not found").into_response()
}

/// Non-numeric ids can't match any user.
fn parse_id(raw: &str) -> Option<u64> {
    raw.parse().ok()
}

async fn add_user(State(list): State<UserList>, Json(input): Json<UserInput>) -> Response {
    let user = list.add(input);
    info!("Added user {}", user.id);
    (StatusCode::CREATED, Json(user)).into_response()
}

async fn get_users(State(list): State<UserList>) -> Json<Vec<User>> {
    Json(list.all())
}

async fn get_user(State(list): State<UserList>, Path(id): Path<String>) -> Response {
    match parse_id(&id).and_then(|id| list.get(id)) {
        Some(user) => Json(user).into_response(),
        None => not_found(),
    }
}

async fn update_user(
    State(list): State<UserList>,
    Path(id): Path<String>,
    Json(input): Json<UserInput>,
) -> Response {
    match parse_id(&id).and_then(|id| list.update(id, input)) {
        Some(user) => (StatusCode::CREATED, Json(user)).into_response(),
        None => not_found(),
    }
}

async fn delete_user(State(list): State<UserList>, Path(id): Path<String>) -> Response {
    if parse_id(&id).is_some_and(|id| list.remove(id)) {
        debug!("Deleted user {}", id);
        (StatusCode::OK, "User deleted").into_response()
    } else {
        not_found()
    }
}
