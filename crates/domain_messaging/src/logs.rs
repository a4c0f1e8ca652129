//! Provider health, usage and test records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{string_enum, AdapterHealth, ProviderId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthTestType {
    Connection,
    SendTest,
    ApiTest,
}

string_enum!(HealthTestType, "health test type", {
    Connection => "connection",
    SendTest => "send_test",
    ApiTest => "api_test",
});

/// One health check of one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealthLog {
    pub id: Uuid,
    pub provider_id: ProviderId,
    pub status: AdapterHealth,
    pub response_time_ms: u64,
    pub error_message: Option<String>,
    pub test_type: HealthTestType,
    pub created_at: DateTime<Utc>,
}

impl ProviderHealthLog {
    pub fn new(
        provider_id: ProviderId,
        status: AdapterHealth,
        response_time_ms: u64,
        error_message: Option<String>,
        test_type: HealthTestType,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            provider_id,
            status,
            response_time_ms,
            error_message,
            test_type,
            created_at: Utc::now(),
        }
    }
}

/// Daily usage aggregate, unique per provider and date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsageLog {
    pub provider_id: ProviderId,
    pub date: NaiveDate,
    pub emails_sent: u32,
    pub emails_failed: u32,
    pub total_response_time_ms: u64,
}

impl ProviderUsageLog {
    pub fn empty(provider_id: ProviderId, date: NaiveDate) -> Self {
        Self {
            provider_id,
            date,
            emails_sent: 0,
            emails_failed: 0,
            total_response_time_ms: 0,
        }
    }

    pub fn add(&mut self, success: bool, elapsed_ms: u64) {
        if success {
            self.emails_sent += 1;
        } else {
            self.emails_failed += 1;
        }
        self.total_response_time_ms += elapsed_ms;
    }

    pub fn average_response_time_ms(&self) -> f64 {
        let attempts = self.emails_sent + self.emails_failed;
        if attempts == 0 {
            0.0
        } else {
            self.total_response_time_ms as f64 / f64::from(attempts)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    Connection,
    Authentication,
    SendTest,
    ApiValidation,
}

string_enum!(TestType, "test type", {
    Connection => "connection",
    Authentication => "authentication",
    SendTest => "send_test",
    ApiValidation => "api_validation",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Success,
    Failed,
    Warning,
}

string_enum!(TestStatus, "test status", {
    Success => "success",
    Failed => "failed",
    Warning => "warning",
});

/// Outcome of an explicit provider test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTestResult {
    pub id: Uuid,
    pub provider_id: ProviderId,
    pub test_type: TestType,
    pub status: TestStatus,
    pub message: String,
    pub response_time_ms: Option<u64>,
    pub test_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ProviderTestResult {
    pub fn new(
        provider_id: ProviderId,
        test_type: TestType,
        status: TestStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            provider_id,
            test_type,
            status,
            message: message.into(),
            response_time_ms: None,
            test_data: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    pub fn with_timing(mut self, elapsed_ms: u64) -> Self {
        self.response_time_ms = Some(elapsed_ms);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.test_data = data;
        self
    }
}
