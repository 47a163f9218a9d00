use std::{fmt, str::FromStr};

/// OBIS identifier of a single measurement point, `A-B:C.D.E*F`.
///
/// Groups:
/// - A: medium (1 = electricity, 129 = manufacturer specific)
/// - B: channel
/// - C: measured quantity
/// - D: measurement type
/// - E: tariff
/// - F: storage / billing period (255 = current value)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct ObisCode {
    pub medium: u8,
    pub channel: u8,
    pub measurement: u8,
    pub measurement_type: u8,
    pub tariff: u8,
    pub previous: u8,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ObisCodeError {
    #[error("malformed OBIS code '{0}', expected A-B:C.D.E*F")]
    Malformed(String),
    #[error("invalid value group '{group}' in OBIS code '{input}'")]
    InvalidGroup { input: String, group: String },
}

impl ObisCode {
    pub const fn new(
        medium: u8,
        channel: u8,
        measurement: u8,
        measurement_type: u8,
        tariff: u8,
        previous: u8,
    ) -> Self {
        Self {
            medium,
            channel,
            measurement,
            measurement_type,
            tariff,
            previous,
        }
    }
}

impl FromStr for ObisCode {
    type Err = ObisCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let malformed = || ObisCodeError::Malformed(input.to_string());
        let group = |g: &str| -> Result<u8, ObisCodeError> {
            g.parse().map_err(|_| ObisCodeError::InvalidGroup {
                input: input.to_string(),
                group: g.to_string(),
            })
        };

        let (a, rest) = input.split_once('-').ok_or_else(malformed)?;
        let (b, rest) = rest.split_once(':').ok_or_else(malformed)?;
        // The storage group is frequently left off; it then means "current value".
        let (cde, f) = match rest.split_once('*') {
            Some((cde, f)) => (cde, Some(f)),
            None => (rest, None),
        };

        let mut parts = cde.split('.');
        let (Some(c), Some(d), Some(e), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
            return Err(malformed());
        };

        Ok(Self {
            medium: group(a)?,
            channel: group(b)?,
            measurement: group(c)?,
            measurement_type: group(d)?,
            tariff: group(e)?,
            previous: f.map(group).transpose()?.unwrap_or(255),
        })
    }
}

impl TryFrom<String> for ObisCode {
    type Error = ObisCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ObisCode> for String {
    fn from(code: ObisCode) -> Self {
        code.to_string()
    }
}

impl fmt::Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}:{}.{}.{}*{}",
            self.medium, self.channel, self.measurement, self.measurement_type, self.tariff, self.previous
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_code() {
        let code: ObisCode = "1-0:16.7.0*255".parse().unwrap();
        assert_eq!(code, ObisCode::new(1, 0, 16, 7, 0, 255));
        assert_eq!(code.to_string(), "1-0:16.7.0*255");
    }

    #[test]
    fn parses_manufacturer_specific_code() {
        let code: ObisCode = "129-129:199.130.3*255".parse().unwrap();
        assert_eq!(code.medium, 129);
        assert_eq!(code.measurement_type, 130);
    }

    #[test]
    fn missing_storage_group_defaults_to_current_value() {
        let code: ObisCode = "1-0:1.8.0".parse().unwrap();
        assert_eq!(code.to_string(), "1-0:1.8.0*255");
    }

    #[test]
    fn rejects_malformed_codes() {
        assert!(matches!("1.8.0".parse::<ObisCode>(), Err(ObisCodeError::Malformed(_))));
        assert!(matches!("1-0:1.8*255".parse::<ObisCode>(), Err(ObisCodeError::Malformed(_))));
        assert!(matches!("1-0:1.8.0.1*255".parse::<ObisCode>(), Err(ObisCodeError::Malformed(_))));
        assert!(matches!(
            "1-0:1.8.x*255".parse::<ObisCode>(),
            Err(ObisCodeError::InvalidGroup { .. })
        ));
        assert!(matches!(
            "1-0:1.8.0*256".parse::<ObisCode>(),
            Err(ObisCodeError::InvalidGroup { .. })
        ));
    }

    #[test]
    fn orders_by_groups() {
        let a: ObisCode = "1-0:1.8.0*255".parse().unwrap();
        let b: ObisCode = "1-0:16.7.0*255".parse().unwrap();
        assert!(a < b);
    }
}
