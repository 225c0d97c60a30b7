//! Terminal formatting for contract records

use oracle_sdk::{ContractKind, OracleStatus, PriceData, TransactionReceipt};

pub fn success(message: impl AsRef<str>) -> String {
    format!("✅ {}", message.as_ref())
}

pub fn failure(message: impl AsRef<str>) -> String {
    format!("❌ {}", message.as_ref())
}

pub fn kind_label(kind: ContractKind) -> &'static str {
    match kind {
        ContractKind::OracleConsumer => "Oracle Consumer",
        ContractKind::SimplePriceFeed => "Simple Price Feed",
    }
}

pub fn oracle_status(status: &OracleStatus) -> Vec<String> {
    vec![
        "Oracle Status:".to_string(),
        format!("  Price: ${} ({})", status.price.eth_usd, status.price.source),
        format!(
            "  Weather: {}°C, {} ({})",
            status.weather.temperature, status.weather.condition, status.weather.city
        ),
        format!("  News Items: {}", status.news.count),
    ]
}

pub fn price_data(data: &PriceData) -> Vec<String> {
    vec![
        format!("Price: ${}", data.price),
        format!("Source: {}", data.source),
    ]
}

pub fn receipt(receipt: &TransactionReceipt) -> String {
    success(format!(
        "Transaction {} reached status {}",
        receipt.hash, receipt.status
    ))
}
