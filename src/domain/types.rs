//! Shared domain enumerations aligned with the backend listing schema.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Available,
    Rented,
    Pending,
    Reserved,
    Unavailable,
    Maintenance,
}

impl ListingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingStatus::Available => "available",
            ListingStatus::Rented => "rented",
            ListingStatus::Pending => "pending",
            ListingStatus::Reserved => "reserved",
            ListingStatus::Unavailable => "unavailable",
            ListingStatus::Maintenance => "maintenance",
        }
    }
}

impl TryFrom<&str> for ListingStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "available" => Ok(ListingStatus::Available),
            "rented" => Ok(ListingStatus::Rented),
            "pending" => Ok(ListingStatus::Pending),
            "reserved" => Ok(ListingStatus::Reserved),
            "unavailable" => Ok(ListingStatus::Unavailable),
            "maintenance" => Ok(ListingStatus::Maintenance),
            _ => Err(()),
        }
    }
}
