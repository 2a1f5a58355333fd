use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::CoreError;

/// Language of user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Tr,
    En,
}

impl FromStr for Locale {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tr" | "tr-tr" => Ok(Locale::Tr),
            "en" | "en-us" | "en-gb" => Ok(Locale::En),
            other => Err(CoreError::ValidationError(format!("unsupported locale '{other}'"))),
        }
    }
}

/// Generic messages shown by the view controllers. The underlying cause is
/// logged, never shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Messages {
    pub add_failed: &'static str,
    pub invalid_amount: &'static str,
    pub category_required: &'static str,
    pub load_failed: &'static str,
    pub delete_failed: &'static str,
    pub confirm_delete: &'static str,
}

const TR: Messages = Messages {
    add_failed: "İşlem eklenirken bir hata oluştu",
    invalid_amount: "Geçerli bir tutar girin",
    category_required: "Kategori seçin",
    load_failed: "İşlemler yüklenirken bir hata oluştu",
    delete_failed: "İşlem silinirken bir hata oluştu",
    confirm_delete: "Bu işlemi silmek istediğinizden emin misiniz?",
};

const EN: Messages = Messages {
    add_failed: "An error occurred while adding the transaction",
    invalid_amount: "Enter a valid amount",
    category_required: "Select a category",
    load_failed: "An error occurred while loading transactions",
    delete_failed: "An error occurred while deleting the transaction",
    confirm_delete: "Are you sure you want to delete this transaction?",
};

impl Messages {
    pub fn for_locale(locale: Locale) -> &'static Messages {
        match locale {
            Locale::Tr => &TR,
            Locale::En => &EN,
        }
    }
}
