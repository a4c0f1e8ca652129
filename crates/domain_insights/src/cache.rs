//! Cached insight sections

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use core_kernel::{string_enum, CustomerId, InsightId};

use crate::error::InsightError;

/// Default lifetime of a cached section
pub const DEFAULT_INSIGHT_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    Payment,
    Communication,
    Claims,
    Profile,
}

string_enum!(InsightType, "insight type", {
    Payment => "payment",
    Communication => "communication",
    Claims => "claims",
    Profile => "profile",
});

/// One computed section, unique per customer and type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRecord {
    pub id: InsightId,
    pub customer_id: CustomerId,
    pub insight_type: InsightType,
    pub data: serde_json::Value,
    pub calculated_at: DateTime<Utc>,
}

impl InsightRecord {
    pub fn new<T: Serialize>(
        customer_id: CustomerId,
        insight_type: InsightType,
        value: &T,
        calculated_at: DateTime<Utc>,
    ) -> Result<Self, InsightError> {
        Ok(Self {
            id: InsightId::new_v7(),
            customer_id,
            insight_type,
            data: serde_json::to_value(value)?,
            calculated_at,
        })
    }

    /// Calculated less than `ttl` before `now`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.calculated_at < ttl
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, InsightError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::PaymentInsights;

    #[test]
    fn test_freshness() {
        let now = Utc::now();
        let record = InsightRecord::new(
            CustomerId::new(),
            InsightType::Payment,
            &PaymentInsights::empty(),
            now - Duration::minutes(30),
        )
        .unwrap();
        assert!(record.is_fresh(now, Duration::hours(1)));
        assert!(!record.is_fresh(now, Duration::minutes(10)));
    }

    #[test]
    fn test_decode_section() {
        let record = InsightRecord::new(
            CustomerId::new(),
            InsightType::Payment,
            &PaymentInsights::empty(),
            Utc::now(),
        )
        .unwrap();
        let decoded: PaymentInsights = record.decode().unwrap();
        assert_eq!(decoded, PaymentInsights::empty());
        assert!(record.decode::<crate::claims::ClaimsInsights>().is_err());
    }
}
