use crate::{
    api::{
        cors::add_cors_headers,
        router::{error_response, json_response, AppState},
    },
    db::new_id,
    models::{Claims, CurrentUser, LoginRequest, RegisterRequest, User},
};

use sqlx::{query, query_as};

// axum high level server
use axum::{
    body::Body,
    extract::{Json, State},
    http::{HeaderMap, Request as HttpRequest, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};

// argon 2 hashing
use argon2::{
    password_hash::{
        rand_core::{OsRng, RngCore},
        PasswordHash, SaltString,
    },
    Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version,
};

// jwt helpers
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use std::sync::LazyLock;

type HandlerError = (StatusCode, &'static str);

// argon 2 password hasher
static ARGON2: LazyLock<Argon2<'static>> = LazyLock::new(|| {
    Argon2::new(
        Algorithm::Argon2id,
        Version::V0x13,
        Params::new(8000, 2, 1, None).expect("valid argon2 params"),
    )
});

// jwt secret, from env or a fresh 32 byte token per run
static JWT_SECRET: LazyLock<Vec<u8>> = LazyLock::new(|| match std::env::var("JWT_SECRET") {
    Ok(s) if !s.is_empty() => s.into_bytes(),
    _ => {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        secret.to_vec()
    }
});

// tokens live for 24 hours, no refresh flow
const TOKEN_TTL_SECS: usize = 86400;

fn issue_token(id: &str, username: &str) -> Result<String, HandlerError> {
    let now = Utc::now().timestamp() as usize;
    encode(
        &Header::default(),
        &Claims {
            sub: id.to_string(),
            username: username.to_string(),
            iat: now,
            exp: now + TOKEN_TTL_SECS,
        },
        &EncodingKey::from_secret(&JWT_SECRET),
    )
    .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "could not issue token"))
}

fn auth_payload(token: String, id: &str, username: &str, email: &str) -> serde_json::Value {
    serde_json::json!({
        "token": token,
        "user": { "id": id, "username": username, "email": email },
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Response<Body> {
    match async {
        let username = req.username.trim().to_string();
        let email = req.email.trim().to_string();

        if username.is_empty() || email.is_empty() || req.password.is_empty() {
            return Err((
                StatusCode::BAD_REQUEST,
                "username, email and password are required",
            ));
        }

        // uniqueness on both columns, case-sensitive like the db enforces it
        let taken = query("SELECT 1 FROM users WHERE username = ? OR email = ?")
            .bind(&username)
            .bind(&email)
            .fetch_optional(&state.pool)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))?
            .is_some();

        if taken {
            return Err((StatusCode::BAD_REQUEST, "username or email already taken"));
        }

        // salt n hash
        let password = ARGON2
            .hash_password(req.password.as_bytes(), &SaltString::generate(&mut OsRng))
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "hashing failed"))?
            .to_string();

        let id = new_id();
        query("INSERT INTO users (id, username, email, password) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&username)
            .bind(&email)
            .bind(&password)
            .execute(&state.pool)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))?;

        let token = issue_token(&id, &username)?;
        Ok(json_response(
            StatusCode::CREATED,
            auth_payload(token, &id, &username, &email),
        ))
    }
    .await
    {
        Ok(resp) => resp,
        Err((status, msg)) => error_response(status, msg),
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Response<Body> {
    match async {
        // one generic rejection whether the email is unknown or the password
        // is wrong, so callers can't enumerate accounts
        let user = query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(req.email.trim())
            .fetch_optional(&state.pool)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))?
            .ok_or((StatusCode::BAD_REQUEST, "invalid credentials"))?;

        let parsed = PasswordHash::new(&user.password)
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "corrupt password hash"))?;

        ARGON2
            .verify_password(req.password.as_bytes(), &parsed)
            .map_err(|_| (StatusCode::BAD_REQUEST, "invalid credentials"))?;

        let token = issue_token(&user.id, &user.username)?;
        Ok(json_response(
            StatusCode::OK,
            auth_payload(token, &user.id, &user.username, &user.email),
        ))
    }
    .await
    {
        Ok(resp) => resp,
        Err((status, msg)) => error_response(status, msg),
    }
}

// current user, sans hash
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Response<Body> {
    match query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&user.id)
        .fetch_optional(&state.pool)
        .await
    {
        Ok(Some(user)) => {
            let mut resp = Json(user).into_response();
            add_cors_headers(&mut resp);
            resp
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, "user not found"),
        Err(e) => {
            eprintln!("database error in me(): {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "database error")
        }
    }
}

// auth middleware: verify the bearer token and stash the caller in request
// extensions for the handlers behind it
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: HttpRequest<Body>,
    next: Next,
) -> Response {
    match verify(&state, req.headers()).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err((status, msg)) => error_response(status, msg),
    }
}

pub async fn verify(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, HandlerError> {
    // decode header
    let token = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").map(str::trim))
        .ok_or((StatusCode::UNAUTHORIZED, "missing credential"))?
        .to_string();

    // decode and verify jwt; the lib handles the expiry check
    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(&JWT_SECRET),
        &Validation::default(),
    )
    .map_err(|_| (StatusCode::UNAUTHORIZED, "invalid or expired credential"))?;

    // the account has to still exist
    query("SELECT 1 FROM users WHERE id = ?")
        .bind(&token_data.claims.sub)
        .fetch_optional(&state.pool)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))?
        .ok_or((StatusCode::UNAUTHORIZED, "invalid or expired credential"))?;

    Ok(CurrentUser {
        id: token_data.claims.sub,
        username: token_data.claims.username,
    })
}
