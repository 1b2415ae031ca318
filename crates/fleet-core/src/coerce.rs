//! Lenient numeric deserializers. The wire protocol's origin is a dynamically
//! typed language where `owner`, `chores_limit`, and `gpus` counts show up as
//! either JSON numbers or numeric strings depending on the caller. Reject
//! neither form.

use serde::{Deserialize, Deserializer};

pub fn u64_lenient<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Lenient::deserialize(deserializer)? {
        Lenient::Num(n) => Ok(n as u64),
        Lenient::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

pub fn opt_u32_lenient<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Lenient>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Lenient::Num(n)) => Ok(Some(n as u32)),
        Some(Lenient::Str(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse().map(Some).map_err(serde::de::Error::custom)
            }
        }
    }
}

/// A GPU request expressed as a bare count, a count-as-string, or an explicit
/// list of GPU indices/names (only its length matters to the scheduler).
pub fn gpu_count_lenient<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum GpuField {
        Count(u32),
        CountStr(String),
        List(Vec<serde_json::Value>),
    }

    match GpuField::deserialize(deserializer)? {
        GpuField::Count(n) => Ok(n),
        GpuField::CountStr(s) => {
            let s = s.trim();
            if s.is_empty() {
                Ok(0)
            } else {
                s.parse().map_err(serde::de::Error::custom)
            }
        }
        GpuField::List(v) => Ok(v.len() as u32),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Num(u64),
    Str(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct W {
        #[serde(deserialize_with = "u64_lenient")]
        owner: u64,
    }

    #[test]
    fn owner_accepts_number_and_string() {
        let a: W = serde_json::from_str(r#"{"owner":1000}"#).unwrap();
        let b: W = serde_json::from_str(r#"{"owner":"1000"}"#).unwrap();
        assert_eq!(a.owner, 1000);
        assert_eq!(b.owner, 1000);
    }

    #[derive(Deserialize)]
    struct G {
        #[serde(deserialize_with = "gpu_count_lenient")]
        gpus: u32,
    }

    #[test]
    fn gpus_accepts_count_string_or_list() {
        let a: G = serde_json::from_str(r#"{"gpus":2}"#).unwrap();
        let b: G = serde_json::from_str(r#"{"gpus":"2"}"#).unwrap();
        let c: G = serde_json::from_str(r#"{"gpus":[0,1]}"#).unwrap();
        assert_eq!(a.gpus, 2);
        assert_eq!(b.gpus, 2);
        assert_eq!(c.gpus, 2);
    }
}
