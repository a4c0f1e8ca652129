//! Request and response bodies

pub mod customer;
pub mod communication;
pub mod policy;
pub mod claims;
pub mod renewal;
pub mod payment;
pub mod hierarchy;
pub mod provider;
pub mod campaign;
pub mod insight;

use serde::{Deserialize, Deserializer};

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
///
/// Use with `#[serde(default, deserialize_with = "crate::dto::double_option")]`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        parent: Option<Option<u32>>,
    }

    #[test]
    fn test_double_option() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.parent, None);

        let null: Patch = serde_json::from_str(r#"{"parent": null}"#).unwrap();
        assert_eq!(null.parent, Some(None));

        let set: Patch = serde_json::from_str(r#"{"parent": 4}"#).unwrap();
        assert_eq!(set.parent, Some(Some(4)));
    }
}
