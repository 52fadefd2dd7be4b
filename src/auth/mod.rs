use actix_web::{
    dev::Payload, error::ErrorUnauthorized, web::Data, Error as ActixError, FromRequest,
    HttpRequest,
};
use anyhow::Result;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

use crate::config::Config;
use crate::database::models::{AuthResponse, Gender, LoginRequest, RegisterRequest, User, UserRole};
use crate::database::repositories::UserRepository;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    pub role: UserRole,
    pub gender: Gender,
    pub exp: usize, // expiration time
}

impl Claims {
    pub fn user_id(&self) -> &str {
        &self.sub
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Administrator access required".to_string(),
            ))
        }
    }
}

impl FromRequest for Claims {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        if let Some(config) = req.app_data::<Data<Config>>() {
            if let Some(token) = bearer_token(req) {
                return match decode_claims(&token, &config.jwt_secret) {
                    Ok(claims) => ready(Ok(claims)),
                    Err(_) => ready(Err(ErrorUnauthorized("Invalid token"))),
                };
            }
        }

        ready(Err(ErrorUnauthorized(
            "Missing or invalid authorization header",
        )))
    }
}

pub(crate) fn bearer_token(req: &HttpRequest) -> Option<String> {
    let auth_header = req.headers().get("Authorization")?.to_str().ok()?;
    auth_header
        .strip_prefix("Bearer ")
        .map(|token| token.to_string())
}

pub fn decode_claims(token: &str, jwt_secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(token_data.claims)
}

/// Thin identity provider: registration, login and token issuing.
/// Password reset and email verification flows are out of scope; volunteers
/// are onboarded directly by the congregation admins.
#[derive(Clone)]
pub struct AuthService {
    user_repository: UserRepository,
    config: Config,
}

impl AuthService {
    pub fn new(user_repository: UserRepository, config: Config) -> Self {
        Self {
            user_repository,
            config,
        }
    }

    pub async fn register(&self, input: RegisterRequest) -> Result<AuthResponse, AppError> {
        let email = input.email.to_lowercase();

        if self.user_repository.find_by_email(&email).await?.is_some() {
            return Err(AppError::BadRequest(
                "An account with this email already exists".to_string(),
            ));
        }

        let password_hash = hash(&input.password, DEFAULT_COST)
            .map_err(|e| AppError::internal_server_error_message(e.to_string()))?;

        let user = User::new(
            email,
            password_hash,
            input.first_name,
            input.last_name,
            input.gender,
        );

        // Concurrent registrations can still race past the existence check;
        // the unique index on users.email settles those.
        let user = self.user_repository.create_user(&user).await.map_err(|e| {
            if AppError::is_unique_violation(&e) {
                AppError::BadRequest("An account with this email already exists".to_string())
            } else {
                AppError::from(e)
            }
        })?;
        let token = self.generate_token(&user)?;

        Ok(AuthResponse { token, user })
    }

    pub async fn login(&self, input: LoginRequest) -> Result<AuthResponse, AppError> {
        let user = self
            .user_repository
            .find_by_email(&input.email.to_lowercase())
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !user.is_active {
            return Err(AppError::Forbidden("Account is deactivated".to_string()));
        }

        let valid = verify(&input.password, &user.password_hash)
            .map_err(|e| AppError::internal_server_error_message(e.to_string()))?;
        if !valid {
            return Err(AppError::Unauthorized);
        }

        let token = self.generate_token(&user)?;
        Ok(AuthResponse { token, user })
    }

    pub fn generate_token(&self, user: &User) -> Result<String, AppError> {
        let expiration = Utc::now() + Duration::days(self.config.jwt_expiration_days);

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            gender: user.gender,
            exp: expiration.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_ref()),
        )
        .map_err(|e| AppError::internal_server_error_message(e.to_string()))
    }

    pub async fn current_user(&self, claims: &Claims) -> Result<User, AppError> {
        self.user_repository
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}
