use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Alias type of a payee key.
///
/// `Unresolved` is used when the type could not be inferred; the transfer
/// still proceeds, but to an unregistered payee.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
pub enum KeyType {
    #[serde(rename = "cpf")]
    TaxIdIndividual,
    #[serde(rename = "cnpj")]
    TaxIdCompany,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "phone")]
    Phone,
    #[serde(rename = "random")]
    RandomToken,
    #[serde(rename = "manual")]
    Unresolved,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::TaxIdIndividual => "cpf",
            KeyType::TaxIdCompany => "cnpj",
            KeyType::Email => "email",
            KeyType::Phone => "phone",
            KeyType::RandomToken => "random",
            KeyType::Unresolved => "manual",
        }
    }

    /// Types a business customer may register on its own account.
    pub fn is_registrable(&self) -> bool {
        matches!(
            self,
            KeyType::TaxIdCompany | KeyType::Email | KeyType::Phone | KeyType::RandomToken
        )
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpf" => Ok(KeyType::TaxIdIndividual),
            "cnpj" => Ok(KeyType::TaxIdCompany),
            "email" => Ok(KeyType::Email),
            "phone" => Ok(KeyType::Phone),
            "random" | "evp" => Ok(KeyType::RandomToken),
            "manual" => Ok(KeyType::Unresolved),
            other => Err(format!("unknown key type '{other}'")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    #[default]
    Active,
    Inactive,
}

/// A registered alias bound to one account of one customer.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PayeeKey {
    pub id: String,
    pub account_id: String,
    pub customer_id: String,
    pub key_type: KeyType,
    pub value: String,
    #[serde(default)]
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
}

/// Infers the key type from the literal shape of `value`.
///
/// Heuristic, evaluated in priority order. Short ambiguous numeric strings
/// can be misclassified; `None` means the caller should match by value alone.
pub fn detect_key_type(value: &str) -> Option<KeyType> {
    let digits = value.chars().filter(char::is_ascii_digit).count();
    let company_punctuation = value.contains(['.', '/']);

    if value.contains('@') {
        return Some(KeyType::Email);
    }
    if value.chars().count() == 36 && value.matches('-').count() == 4 {
        return Some(KeyType::RandomToken);
    }
    if digits == 14 || (company_punctuation && (11..=14).contains(&digits)) {
        return Some(KeyType::TaxIdCompany);
    }
    if digits == 11 && !value.starts_with('+') {
        return Some(KeyType::TaxIdIndividual);
    }
    if value.starts_with('+') || ((10..=13).contains(&digits) && !company_punctuation) {
        return Some(KeyType::Phone);
    }
    None
}

/// Human-readable rendering of a key value for receipts and listings.
pub fn display_value(key_type: KeyType, value: &str) -> String {
    let d: String = value.chars().filter(char::is_ascii_digit).collect();
    match (key_type, d.len()) {
        (KeyType::TaxIdCompany, 14) => format!(
            "{}.{}.{}/{}-{}",
            &d[..2],
            &d[2..5],
            &d[5..8],
            &d[8..12],
            &d[12..]
        ),
        (KeyType::TaxIdIndividual, 11) => {
            format!("{}.{}.{}-{}", &d[..3], &d[3..6], &d[6..9], &d[9..])
        }
        (KeyType::Phone, 11) => format!("({}) {}-{}", &d[..2], &d[2..7], &d[7..]),
        (KeyType::Phone, 13) => format!("+{} ({}) {}-{}", &d[..2], &d[2..4], &d[4..9], &d[9..]),
        _ => value.to_string(),
    }
}
