use serde::Serialize;

/// A swimming pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pool {
    pub id: i64,
    pub name: String,
    pub address: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A training group as listed to clients: category, pool and trainer
/// resolved to display values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub id: i64,
    pub category: String,
    pub pool_name: String,
    pub trainer_name: String,
    /// Account id of the trainer.
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A subscription plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    pub id: i64,
    pub name: String,
    pub visits_per_week: u8,
    pub price: f64,
}
