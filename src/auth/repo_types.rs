use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// What an account does on the marketplace. Stored as lowercase TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Role {
    Donor,
    Recipient,
    Volunteer,
}

/// Signup sends the role as a free-form string.
impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "donor" => Ok(Role::Donor),
            "recipient" => Ok(Role::Recipient),
            "volunteer" => Ok(Role::Volunteer),
            other => anyhow::bail!("unknown role: {other}"),
        }
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String, // unique, stored lower-cased
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string
    pub role: Role,
    pub created_at: OffsetDateTime,
}

/// Validated signup data ready to be stored.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use sqlx::{Postgres, Type, TypeInfo};

    use super::*;

    #[test]
    fn role_is_stored_as_lowercase_text() {
        let info = <Role as Type<Postgres>>::type_info();
        assert!(info.name().eq_ignore_ascii_case("text"));
        assert_eq!(serde_json::to_value(Role::Volunteer).unwrap(), "volunteer");
    }

    #[test]
    fn role_parses_only_known_names() {
        assert_eq!("recipient".parse::<Role>().unwrap(), Role::Recipient);
        assert!("admin".parse::<Role>().is_err());
        assert!("Donor".parse::<Role>().is_err());
    }
}
