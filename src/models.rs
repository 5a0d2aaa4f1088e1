use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterForm {
    /// Full name, family name first ("Yamada Taro").
    #[schema(example = "Yamada Taro")]
    #[validate(length(min = 1, max = 20, message = "Please enter a name of at most 20 characters"))]
    #[serde(default)]
    pub name: String,
    #[schema(example = "taro@example.com")]
    #[validate(email(message = "Please enter a valid email address"))]
    #[serde(default)]
    pub email: String,
    #[schema(example = "password123")]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[serde(default)]
    pub password: String,
    #[schema(example = "password123")]
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    #[serde(default)]
    pub password_confirmation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginForm {
    #[schema(example = "taro@example.com")]
    #[validate(email(message = "Please enter a valid email address"))]
    #[serde(default)]
    pub email: String,
    #[schema(example = "password123")]
    #[validate(length(min = 1, message = "Please enter your password"))]
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// Email of the user at issue time.
    pub sub: String,
    pub role: String,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TokenType {
    Session,
    EmailVerification,
}
