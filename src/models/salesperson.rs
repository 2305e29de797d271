use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SalespersonStatus {
    Active,
    Inactive,
    Suspended,
}

/// Settlement lifecycle shared by sales and agent commissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SettlementStatus {
    Pending,
    Settled,
    Cancelled,
}

/// A reseller node in the agent forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Salesperson {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: SalespersonStatus,
    /// Default rate on own sales when an assignment has none
    pub commission_rate: f64,
    pub total_sales: f64,
    pub total_commission: f64,
    pub parent_id: Option<i64>,
    /// 0 for a root, parent's level + 1 otherwise
    pub level: i64,
    pub children_count: i64,
    pub agent_code: Option<String>,
    /// Rate this node earns on sales of its direct downline
    pub parent_commission_rate: f64,
    pub last_login_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateSalesperson {
    pub username: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub commission_rate: f64,
    #[serde(default = "default_parent_commission_rate")]
    pub parent_commission_rate: f64,
}

pub fn default_parent_commission_rate() -> f64 {
    0.1
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSalesperson {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub email: Option<Option<String>>,
    pub status: Option<SalespersonStatus>,
    pub commission_rate: Option<f64>,
    pub parent_commission_rate: Option<f64>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SalespersonFilter {
    #[serde(default)]
    pub status: Option<SalespersonStatus>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

/// Grants a salesperson the right to mint one (software, key type) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalespersonProduct {
    pub id: i64,
    pub salesperson_id: i64,
    pub software_id: i64,
    pub key_type_id: i64,
    pub commission_rate: f64,
    /// 0 = unlimited
    pub key_gen_limit: i64,
    pub keys_generated: i64,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct AssignProduct {
    pub software_id: i64,
    pub key_type_id: i64,
    #[serde(default)]
    pub commission_rate: Option<f64>,
    #[serde(default)]
    pub key_gen_limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalespersonProductDetail {
    #[serde(flatten)]
    pub product: SalespersonProduct,
    pub software_name: String,
    pub key_type_name: String,
    pub hours: i64,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalespersonSale {
    pub id: i64,
    pub salesperson_id: i64,
    pub software_id: i64,
    pub key_type_id: i64,
    pub key_count: i64,
    pub sale_amount: f64,
    pub commission_rate: f64,
    pub commission: f64,
    pub status: SettlementStatus,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub notes: Option<String>,
    pub settled_at: Option<i64>,
    pub created_at: i64,
}

/// Optional customer details recorded on a sale.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleDetails {
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleFilter {
    #[serde(default)]
    pub status: Option<SettlementStatus>,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CommissionStats {
    pub total_sales: f64,
    pub total_commission: f64,
    pub pending_amount: f64,
    pub settled_amount: f64,
    pub cancelled_amount: f64,
}

/// Mint request from a salesperson, recorded as one sale.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateKeys {
    pub software_id: i64,
    pub key_type_id: i64,
    pub count: i64,
    #[serde(flatten)]
    pub details: SaleDetails,
}
