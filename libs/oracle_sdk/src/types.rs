//! Records exchanged with oracle contracts

use crate::error::SdkError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Default city passed to `update_all`
pub const DEFAULT_CITY: &str = "Hanoi";
/// Default latitude passed to `update_all`
pub const DEFAULT_LAT: &str = "21.0245";
/// Default longitude passed to `update_all`
pub const DEFAULT_LON: &str = "105.8412";
/// Default number of news items requested by `update_all`
pub const DEFAULT_NEWS_LIMIT: u32 = 3;

/// Address of a deployed contract, `0x` followed by 40 hex digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractAddress(String);

impl ContractAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContractAddress {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| SdkError::InvalidAddress(s.to_string()))?;
        let bytes = hex::decode(digits).map_err(|_| SdkError::InvalidAddress(s.to_string()))?;
        if bytes.len() != 20 {
            return Err(SdkError::InvalidAddress(s.to_string()));
        }
        Ok(Self(format!("0x{digits}")))
    }
}

impl TryFrom<String> for ContractAddress {
    type Error = SdkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContractAddress> for String {
    fn from(address: ContractAddress) -> Self {
        address.0
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot returned by the oracle consumer's `get_status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleStatus {
    pub price: PriceInfo,
    pub weather: Weather,
    pub news: News,
}

/// Price section of [`OracleStatus`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceInfo {
    /// ETH/USD price as a decimal string
    pub eth_usd: String,
    pub source: String,
}

/// Weather section of [`OracleStatus`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    /// Temperature in °C as a decimal string
    pub temperature: String,
    pub condition: String,
    pub city: String,
}

/// News section of [`OracleStatus`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct News {
    pub count: u64,
}

/// Record returned by the simple price feed's `get_price`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceData {
    pub price: String,
    pub source: String,
}

/// Optional overrides for `update_all`.
///
/// Missing or empty fields (and a zero `news_limit`) fall back to the
/// `DEFAULT_*` constants one by one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateParams {
    pub city: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub news_limit: Option<u32>,
}

impl UpdateParams {
    /// Contract arguments in `update_all` order
    pub fn to_args(&self) -> Vec<Value> {
        fn or_default<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
            value.as_deref().filter(|v| !v.is_empty()).unwrap_or(default)
        }

        vec![
            json!(or_default(&self.city, DEFAULT_CITY)),
            json!(or_default(&self.lat, DEFAULT_LAT)),
            json!(or_default(&self.lon, DEFAULT_LON)),
            json!(self.news_limit.filter(|n| *n > 0).unwrap_or(DEFAULT_NEWS_LIMIT)),
        ]
    }
}

/// Opaque transaction identifier returned by a write call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transaction status reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Accepted,
    Finalized,
    Canceled,
    #[serde(untagged)]
    Other(String),
}

impl TransactionStatus {
    /// Parse a status name as reported by the node (case-insensitive)
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "accepted" => Self::Accepted,
            "finalized" => Self::Finalized,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Other(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Finalized => "finalized",
            Self::Canceled => "canceled",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receipt of a transaction that reached a terminal status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub hash: TxHash,
    pub status: TransactionStatus,
    /// Full transaction object as returned by the node
    pub raw: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_address_parsing() {
        let address: ContractAddress = "0xe0E45EC84BB780BB1cccAc1B0CB09E507eF37147"
            .parse()
            .unwrap();
        assert_eq!(address.as_str(), "0xe0E45EC84BB780BB1cccAc1B0CB09E507eF37147");

        assert!("e0E45EC84BB780BB1cccAc1B0CB09E507eF37147"
            .parse::<ContractAddress>()
            .is_err());
        assert!("0x1234".parse::<ContractAddress>().is_err());
        assert!("0xzz45EC84BB780BB1cccAc1B0CB09E507eF37147"
            .parse::<ContractAddress>()
            .is_err());
    }

    #[test]
    fn test_update_params_defaults() {
        let args = UpdateParams::default().to_args();
        assert_eq!(args, vec![json!("Hanoi"), json!("21.0245"), json!("105.8412"), json!(3)]);
    }

    #[test]
    fn test_update_params_partial_override() {
        let params = UpdateParams {
            city: Some("Paris".to_string()),
            lat: Some(String::new()),
            lon: None,
            news_limit: Some(0),
        };
        let args = params.to_args();
        assert_eq!(args, vec![json!("Paris"), json!("21.0245"), json!("105.8412"), json!(3)]);

        let params = UpdateParams {
            news_limit: Some(5),
            ..Default::default()
        };
        assert_eq!(params.to_args()[3], json!(5));
    }

    #[test]
    fn test_status_deserialization() {
        let value = json!({
            "price": {"eth_usd": "3120.55", "source": "coingecko"},
            "weather": {"temperature": "29.1", "condition": "Clear", "city": "Hanoi"},
            "news": {"count": 3}
        });
        let status: OracleStatus = serde_json::from_value(value).unwrap();
        assert_eq!(status.price.eth_usd, "3120.55");
        assert_eq!(status.news.count, 3);

        let malformed = json!({"price": {"eth_usd": "1"}});
        assert!(serde_json::from_value::<OracleStatus>(malformed).is_err());
    }

    #[test]
    fn test_price_data_ignores_extra_fields() {
        let value = json!({"price": "2500.1", "source": "proxy", "proxy_url": "https://p"});
        let data: PriceData = serde_json::from_value(value).unwrap();
        assert_eq!(data.price, "2500.1");
    }

    #[test]
    fn test_transaction_status_names() {
        assert_eq!(TransactionStatus::from_name("FINALIZED"), TransactionStatus::Finalized);
        assert_eq!(TransactionStatus::from_name("cancelled"), TransactionStatus::Canceled);
        assert_eq!(
            TransactionStatus::from_name("UNDETERMINED"),
            TransactionStatus::Other("UNDETERMINED".to_string())
        );
        assert_eq!(TransactionStatus::Finalized.to_string(), "finalized");
    }
}
