use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Software {
    pub id: i64,
    pub name: String,
    pub version: String,
    pub announcement: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateSoftware {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub announcement: Option<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSoftware {
    pub name: Option<String>,
    pub version: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub announcement: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogFilter {
    #[serde(default)]
    pub is_active: Option<bool>,
    /// Substring match on the name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

/// Pricing and validity template for keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyType {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Validity after activation
    pub hours: i64,
    pub price: f64,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateKeyType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub hours: i64,
    pub price: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateKeyType {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub description: Option<Option<String>>,
    pub hours: Option<i64>,
    pub price: Option<f64>,
}

/// Many-to-many link gating which key types can be minted for a software.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftwareKeyType {
    pub id: i64,
    pub software_id: i64,
    pub key_type_id: i64,
    pub is_active: bool,
    pub creator_id: i64,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct BindKeyType {
    pub software_id: i64,
    pub key_type_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundKeyType {
    #[serde(flatten)]
    pub key_type: KeyType,
    pub binding_active: bool,
}
