use serde::de::{Error, Visitor};
use serde::Deserializer;
use std::fmt::Formatter;

// Values read out of REST responses and text files often arrive as strings ("514") where the
// model wants a number, so integer fields accept either representation.
pub(crate) fn deserialize_lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct IntOrString;

    impl<'de> Visitor<'de> for IntOrString {
        type Value = Option<i64>;

        fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
            formatter.write_str("integer, string containing an integer, or null")
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(Some(v))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            i64::try_from(v)
                .map(Some)
                .map_err(|_| E::custom(format!("integer {} out of range", v)))
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: Error,
        {
            let v = v.trim();
            if v.is_empty() {
                return Ok(None);
            }
            v.parse::<i64>()
                .map(Some)
                .map_err(|e| E::custom(format!("invalid integer '{}': {}", v, e)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(None)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_any(IntOrString)
        }
    }
    deserializer.deserialize_option(IntOrString)
}

#[cfg(test)]
mod lenient_int_tests {
    use crate::LogForwarding;

    fn port(json: &str) -> Option<i64> {
        serde_json::from_str::<LogForwarding>(json).unwrap().port
    }

    #[test]
    fn number_representation() {
        assert_eq!(port(r#"{"port": 514}"#), Some(514));
        assert_eq!(port(r#"{"port": 0}"#), Some(0));
        assert_eq!(port(r#"{"port": 65536}"#), Some(65536));
    }

    #[test]
    fn string_representation() {
        assert_eq!(port(r#"{"port": "514"}"#), Some(514));
        assert_eq!(port(r#"{"port": " 1 "}"#), Some(1));
    }

    #[test]
    fn none_representation() {
        assert_eq!(port(r#"{}"#), None);
        assert_eq!(port(r#"{"port": null}"#), None);
        assert_eq!(port(r#"{"port": ""}"#), None);
    }

    #[test]
    fn bad_representation() {
        for json in &[r#"{"port": "http"}"#, r#"{"port": 1.5}"#, r#"{"port": []}"#] {
            assert!(serde_json::from_str::<LogForwarding>(json).is_err());
        }
    }
}
