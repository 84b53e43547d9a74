//! Actor identity carried by bearer tokens

use serde::{Deserialize, Serialize};

use super::patron::CardNumber;
use crate::error::AppError;

/// Role of the acting user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Librarian,
    Patron,
}

impl Role {
    /// Staff roles may confirm, refuse and close checkouts
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin | Role::Librarian)
    }
}

/// JWT claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub role: Role,
    /// Present for patrons: the card they act for
    #[serde(default)]
    pub card_number: Option<CardNumber>,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn actor(&self) -> Actor {
        Actor {
            login: self.sub.clone(),
            role: self.role,
            card_number: self.card_number.clone(),
        }
    }

    pub fn require_privileged(&self) -> Result<(), AppError> {
        if self.role.is_privileged() {
            Ok(())
        } else {
            Err(AppError::Authorization("Staff privileges required".to_string()))
        }
    }

    /// Staff may act for any card, patrons only for their own
    pub fn require_card(&self, card_number: &CardNumber) -> Result<(), AppError> {
        if self.role.is_privileged() || self.card_number.as_ref() == Some(card_number) {
            Ok(())
        } else {
            Err(AppError::Authorization("Cannot act for another patron".to_string()))
        }
    }
}

/// The acting user as seen by the services
#[derive(Debug, Clone)]
pub struct Actor {
    pub login: String,
    pub role: Role,
    pub card_number: Option<CardNumber>,
}

impl Actor {
    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }

    pub fn require_privileged(&self) -> Result<(), AppError> {
        if self.is_privileged() {
            Ok(())
        } else {
            Err(AppError::Authorization("Staff privileges required".to_string()))
        }
    }

    /// Staff may act for any card, patrons only for their own
    pub fn require_card(&self, card_number: &CardNumber) -> Result<(), AppError> {
        if self.is_privileged() || self.card_number.as_ref() == Some(card_number) {
            Ok(())
        } else {
            Err(AppError::Authorization("Cannot act for another patron".to_string()))
        }
    }

    pub fn staff(login: &str) -> Self {
        Self {
            login: login.to_string(),
            role: Role::Librarian,
            card_number: None,
        }
    }

    pub fn patron(login: &str, card_number: CardNumber) -> Self {
        Self {
            login: login.to_string(),
            role: Role::Patron,
            card_number: Some(card_number),
        }
    }
}
