use serde::{Deserialize, Serialize};

use crate::users::User;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub pets: usize,
    pub orders: usize,
    pub users: usize,
    pub sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NameQuery {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UsernameQuery {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub username: String,
}

/// `/users` bodies may carry one user or an array of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UserPayload {
    Many(Vec<User>),
    One(User),
}
