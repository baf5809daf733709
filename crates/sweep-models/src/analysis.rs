use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::dataset::MarketDataset;
use crate::lenient;

/// Input to an analysis call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRequest {
    pub request_id: Uuid,
    pub datasets: Vec<MarketDataset>,
    pub spot_price: Option<f64>,
}

impl AnalysisRequest {
    pub fn new(datasets: Vec<MarketDataset>, spot_price: Option<f64>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            datasets,
            spot_price,
        }
    }
}

/// Model output. Opaque beyond being a JSON object: known fields default
/// when absent and anything else is carried in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AnalysisResult {
    #[serde(default)]
    pub outlook: Value,
    #[serde(default, deserialize_with = "lenient::list")]
    pub levels: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}
