// Authentication: registration, login, token refresh.
// JWT access/refresh pairs (HS256) with Argon2 password hashing.
// Every /api route except the token endpoints sits behind `require_auth`.

pub mod handlers;
pub mod middleware;
pub mod password;
pub mod tokens;
