use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::geo::Coordinate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub coordinate: Coordinate,
    pub address: String,
}

impl Location {
    pub fn new(coordinate: Coordinate, address: impl Into<String>) -> Result<Self, DomainError> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(DomainError::Validation("address cannot be blank".to_string()));
        }
        Ok(Self {
            coordinate,
            address,
        })
    }
}

/// Opaque reference to the recipient's contact record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactRef(String);

impl ContactRef {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::Validation("contact cannot be blank".to_string()));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::{ContactRef, Location};
    use crate::geo::Coordinate;

    #[test]
    fn blank_address_is_rejected() {
        let c = Coordinate::new(37.5, 127.0).unwrap();
        assert!(Location::new(c, "   ").is_err());
        assert!(Location::new(c, "1 Sejong-daero").is_ok());
    }

    #[test]
    fn blank_contact_is_rejected() {
        assert!(ContactRef::new("").is_err());
        assert_eq!(ContactRef::new("contact-42").unwrap().as_str(), "contact-42");
    }
}
