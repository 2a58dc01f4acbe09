/// Decimal-string serde for exact token amounts
///
/// Reserves and transfer amounts are arbitrary-precision integers. The ledger
/// exchanges them as base-10 strings.

use num_bigint::BigUint;

/// Serialize a [`BigUint`] as a decimal string
pub mod decimal {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(amount: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&amount.to_str_radix(10))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BigUint::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Same as [`decimal`] for optional amounts
pub mod decimal_opt {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(amount: &Option<BigUint>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match amount {
            Some(value) => serializer.serialize_some(&value.to_str_radix(10)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<BigUint>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        s.map(|s| BigUint::from_str(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Holder {
        #[serde(with = "decimal")]
        amount: BigUint,
        #[serde(with = "decimal_opt", default)]
        bound: Option<BigUint>,
    }

    #[test]
    fn test_amounts_travel_as_decimal_strings() {
        let holder = Holder {
            amount: BigUint::from(10u32).pow(30),
            bound: Some(BigUint::from(90u32)),
        };
        let json = serde_json::to_string(&holder).unwrap();
        assert_eq!(
            json,
            r#"{"amount":"1000000000000000000000000000000","bound":"90"}"#
        );
        assert_eq!(serde_json::from_str::<Holder>(&json).unwrap(), holder);
    }

    #[test]
    fn test_rejects_non_decimal_amount() {
        assert!(serde_json::from_str::<Holder>(r#"{"amount":"-5"}"#).is_err());
        assert!(serde_json::from_str::<Holder>(r#"{"amount":"1.5"}"#).is_err());
    }
}
