use serde::{Deserialize, Serialize};

use crate::users::repo::Subscription;

/// Request body for registration.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub subscription: Option<Subscription>,
}

/// Response returned after registration. Never echoes the verification
/// token or the password hash.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub subscription: Subscription,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub email: String,
    pub subscription: Subscription,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Request body for re-sending the verification email.
#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_carries_token_and_public_user() {
        let response = LoginResponse {
            token: "jwt-token".into(),
            user: PublicUser {
                email: "alice@example.com".into(),
                subscription: Subscription::Starter,
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["token"], "jwt-token");
        assert_eq!(json["user"]["email"], "alice@example.com");
        assert_eq!(json["user"]["subscription"], "starter");
    }

    #[test]
    fn signup_request_subscription_is_optional() {
        let request: SignupRequest =
            serde_json::from_str(r#"{"email":"a@b.co","password":"Passw0rd!"}"#).unwrap();
        assert!(request.subscription.is_none());

        let request: SignupRequest = serde_json::from_str(
            r#"{"email":"a@b.co","password":"Passw0rd!","subscription":"pro"}"#,
        )
        .unwrap();
        assert_eq!(request.subscription, Some(Subscription::Pro));
    }
}
