use chrono::{DateTime, FixedOffset, Local};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub district: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl Address {
    pub fn one_line(&self) -> String {
        let parts = [
            format!("{}, {}", self.street, self.number),
            self.district.clone(),
            format!("{}/{}", self.city, self.state),
            self.zip_code.clone(),
        ];
        parts
            .iter()
            .map(|p| p.trim_matches(|c: char| c == ',' || c == '/' || c.is_whitespace()))
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" - ")
    }
}

/// Issuer (emitente) or recipient (destinatário) of the invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Party {
    /// CNPJ, or CPF for individuals.
    pub tax_id: String,
    pub name: String,
    pub trade_name: String,
    pub state_registration: String,
    pub address: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Carrier {
    pub tax_id: String,
    pub name: String,
    pub state_registration: String,
    pub address: String,
    pub city: String,
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NfeProduct {
    pub code: String,
    pub description: String,
    pub ncm: String,
    pub cfop: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_value: Decimal,
    pub total_value: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NfeTotals {
    pub products: Decimal,
    pub freight: Decimal,
    pub insurance: Decimal,
    pub discount: Decimal,
    pub ipi: Decimal,
    pub invoice: Decimal,
}

/// Parsed NFe electronic invoice, the input of DANFE rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NfeDocument {
    pub access_key: String,
    pub issuer: Party,
    pub recipient: Party,
    pub carrier: Option<Carrier>,
    pub products: Vec<NfeProduct>,
    pub totals: NfeTotals,
    pub additional_info: Option<String>,
    pub authorization_protocol: Option<String>,
    pub issued_at: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DanfeMetadata {
    pub issuer_cnpj: String,
    pub recipient_cnpj: String,
    pub total_value: Decimal,
    pub product_count: usize,
    pub generation_seconds: f64,
    pub page_format: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DanfeOutcome {
    pub file_path: PathBuf,
    pub access_key: String,
    #[serde(rename = "file_size")]
    pub file_size_bytes: u64,
    pub pages: usize,
    #[serde(rename = "generation_time")]
    pub completed_at: DateTime<Local>,
    pub metadata: DanfeMetadata,
}
