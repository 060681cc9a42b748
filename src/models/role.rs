use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Veterinarian,
    Receptionist,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Veterinarian => "veterinarian",
            Role::Receptionist => "receptionist",
            Role::Client => "client",
        }
    }

    /// Staff allowed to sell medicines and browse sales.
    pub fn can_sell(&self) -> bool {
        match self {
            Role::Admin | Role::Veterinarian | Role::Receptionist => true,
            Role::Client => false,
        }
    }

    /// Cancelling sales and revenue reporting.
    pub fn can_manage_sales(&self) -> bool {
        match self {
            Role::Admin => true,
            Role::Veterinarian | Role::Receptionist | Role::Client => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "veterinarian" => Ok(Role::Veterinarian),
            "receptionist" => Ok(Role::Receptionist),
            "client" => Ok(Role::Client),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
