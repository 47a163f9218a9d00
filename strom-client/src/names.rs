//! Display names for well-known OBIS codes.
//!
//! The decoder usually supplies a resolved name with every point. This table
//! fills the gap when it does not, so that diagnostics stay readable.

use std::str::FromStr;

use crate::domain::ObisCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(try_from = "String"))]
pub enum Language {
    #[default]
    De,
    En,
}

#[derive(thiserror::Error, Debug)]
#[error("unsupported OBIS name language '{0}'")]
pub struct UnknownLanguage(String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "de" => Ok(Self::De),
            "en" => Ok(Self::En),
            other => Err(UnknownLanguage(other.to_string())),
        }
    }
}

impl TryFrom<String> for Language {
    type Error = UnknownLanguage;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

struct Entry {
    code: ObisCode,
    de: &'static str,
    en: &'static str,
}

const NAMES: &[Entry] = &[
    Entry {
        code: ObisCode::new(1, 0, 0, 0, 9, 255),
        de: "Geräte-ID",
        en: "Device ID",
    },
    Entry {
        code: ObisCode::new(1, 0, 1, 8, 0, 255),
        de: "Zählerstand Summe Wirkarbeit Bezug + (Total)",
        en: "Meter reading active energy import + (total)",
    },
    Entry {
        code: ObisCode::new(1, 0, 1, 8, 1, 255),
        de: "Zählerstand Summe Wirkarbeit Bezug + (T1)",
        en: "Meter reading active energy import + (T1)",
    },
    Entry {
        code: ObisCode::new(1, 0, 1, 8, 2, 255),
        de: "Zählerstand Summe Wirkarbeit Bezug + (T2)",
        en: "Meter reading active energy import + (T2)",
    },
    Entry {
        code: ObisCode::new(1, 0, 2, 8, 0, 255),
        de: "Zählerstand Summe Wirkarbeit Lieferung - (Total)",
        en: "Meter reading active energy export - (total)",
    },
    Entry {
        code: ObisCode::new(1, 0, 16, 7, 0, 255),
        de: "Momentanwert Gesamtwirkleistung (Total)",
        en: "Instantaneous total active power (total)",
    },
    Entry {
        code: ObisCode::new(1, 0, 36, 7, 0, 255),
        de: "Momentanwert Wirkleistung L1",
        en: "Instantaneous active power L1",
    },
    Entry {
        code: ObisCode::new(1, 0, 56, 7, 0, 255),
        de: "Momentanwert Wirkleistung L2",
        en: "Instantaneous active power L2",
    },
    Entry {
        code: ObisCode::new(1, 0, 76, 7, 0, 255),
        de: "Momentanwert Wirkleistung L3",
        en: "Instantaneous active power L3",
    },
    Entry {
        code: ObisCode::new(129, 129, 199, 130, 3, 255),
        de: "Hersteller",
        en: "Manufacturer ID",
    },
    Entry {
        code: ObisCode::new(129, 129, 199, 130, 5, 255),
        de: "Öffentlicher Schlüssel",
        en: "Public key",
    },
];

pub fn resolve(code: &ObisCode, language: Language) -> Option<&'static str> {
    NAMES.iter().find(|e| e.code == *code).map(|e| match language {
        Language::De => e.de,
        Language::En => e.en,
    })
}
