use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KeyStatus {
    Unused,
    Used,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CreatorType {
    Admin,
    Salesperson,
}

/// A single redeemable license unit.
///
/// `type_name`, `hours` and `price` are copied from the key type at mint
/// time so later key-type edits never change an issued key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Key {
    pub id: i64,
    /// Public share code
    pub code: String,
    /// Short activation code
    pub key_code: String,
    pub key_type_id: i64,
    pub type_name: String,
    pub hours: i64,
    pub price: f64,
    pub software_id: i64,
    pub software_name: String,
    pub status: KeyStatus,
    pub creator_id: i64,
    pub creator_type: CreatorType,
    pub salesperson_id: Option<i64>,
    pub activator_id: Option<i64>,
    pub device_info: Option<String>,
    pub used_at: Option<i64>,
    pub activated_at: Option<i64>,
    pub expired_at: Option<i64>,
    pub is_blacklisted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Key {
    /// Activated, not voided and not past its expiry.
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.status == KeyStatus::Used && self.expired_at.is_some_and(|exp| now < exp)
    }
}

/// Filters shared by key listing and export. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyFilter {
    #[serde(default)]
    pub status: Option<KeyStatus>,
    #[serde(default)]
    pub key_type_id: Option<i64>,
    #[serde(default)]
    pub software_id: Option<i64>,
    #[serde(default)]
    pub creator_id: Option<i64>,
    #[serde(default)]
    pub creator_type: Option<CreatorType>,
    #[serde(default)]
    pub salesperson_id: Option<i64>,
    #[serde(default)]
    pub activator_id: Option<i64>,
    /// Substring match on the share code
    #[serde(default)]
    pub code: Option<String>,
    /// Substring match on the activation code
    #[serde(default)]
    pub key_code: Option<String>,
    /// Inclusive lower bound on `created_at`
    #[serde(default)]
    pub start_time: Option<i64>,
    /// Inclusive upper bound on `created_at`
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MintKeys {
    pub software_id: i64,
    pub key_type_id: i64,
    pub count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivateKey {
    pub code: String,
    pub key_code: String,
    pub software_id: i64,
    #[serde(default)]
    pub device_info: Option<String>,
    #[serde(default)]
    pub activator_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyStatusView {
    pub id: i64,
    pub code: String,
    pub software_id: i64,
    pub software_name: String,
    pub type_name: String,
    pub hours: i64,
    pub status: KeyStatus,
    pub activated_at: Option<i64>,
    pub expired_at: Option<i64>,
    pub is_blacklisted: bool,
    pub valid: bool,
}

impl KeyStatusView {
    pub fn from_key(key: Key, now: i64) -> Self {
        let valid = key.is_valid_at(now) && !key.is_blacklisted;
        Self {
            id: key.id,
            code: key.code,
            software_id: key.software_id,
            software_name: key.software_name,
            type_name: key.type_name,
            hours: key.hours,
            status: key.status,
            activated_at: key.activated_at,
            expired_at: key.expired_at,
            is_blacklisted: key.is_blacklisted,
            valid,
        }
    }
}
