//! Customer validation rules
//!
//! Field-shape checks come from the `validator` derive on [`Customer`]; this
//! module layers the business rules on top:
//!
//! - a customer must be reachable, so at least one of email or phone is set
//! - phone numbers contain only digits, spaces, `+` and `-`
//! - an HNI profile with no policies is flagged as a warning
//! - `first_policy_date` cannot be in the future

use chrono::Utc;
use validator::Validate;

use crate::customer::{Customer, CustomerProfile};

/// Result of customer validation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    /// Non-fatal issues
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.is_valid = false;
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Joins the errors into a single message, if any
    pub fn error_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("; "))
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::ok()
    }
}

/// Validator for customer records
pub struct CustomerValidator;

impl CustomerValidator {
    pub fn validate(customer: &Customer) -> ValidationResult {
        let mut result = ValidationResult::ok();

        if let Err(errors) = customer.validate() {
            for (field, _) in errors.field_errors() {
                result.add_error(format!("{} is invalid", field));
            }
        }

        if customer.first_name.trim().is_empty() {
            result.add_error("First name is required");
        }

        if customer.email.is_none() && customer.phone.is_none() {
            result.add_error("Either email or phone is required");
        }

        if let Some(phone) = &customer.phone {
            if !Self::is_valid_phone(phone) {
                result.add_error("Phone number contains invalid characters");
            }
        }

        if let Some(first) = customer.first_policy_date {
            if first > Utc::now().date_naive() {
                result.add_error("First policy date cannot be in the future");
            }
        }

        if customer.profile == CustomerProfile::Hni && customer.total_policies == 0 {
            result.add_warning("HNI profile set on a customer with no policies");
        }

        result
    }

    fn is_valid_phone(phone: &str) -> bool {
        let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
        digits >= 7
            && phone
                .chars()
                .all(|c| c.is_ascii_digit() || c == ' ' || c == '+' || c == '-')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_customer() {
        let customer = Customer::new("Asha", "Rao").with_email("asha@example.com");
        let result = CustomerValidator::validate(&customer);
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn test_unreachable_customer() {
        let customer = Customer::new("Asha", "Rao");
        let result = CustomerValidator::validate(&customer);
        assert!(!result.is_valid);
        assert!(result.error_message().unwrap().contains("email or phone"));
    }

    #[test]
    fn test_bad_phone_and_email() {
        let customer = Customer::new("Asha", "Rao")
            .with_email("not-an-email")
            .with_phone("98x765432");
        let result = CustomerValidator::validate(&customer);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_hni_without_policies_warns() {
        let mut customer = Customer::new("Asha", "Rao").with_phone("+91 98765 43210");
        customer.profile = CustomerProfile::Hni;
        let result = CustomerValidator::validate(&customer);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }
}
