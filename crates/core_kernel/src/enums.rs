//! Helpers for enums that are stored and transported as snake_case strings
//!
//! Status and category enums are persisted as `TEXT` columns and appear in
//! query strings, so each one needs a stable string form in both directions.
//! `string_enum!` generates `as_str`, `ALL`, `Display` and `FromStr` for such
//! an enum; serde derives stay on the enum itself.

/// Implements string conversions for a fieldless enum
///
/// ```rust
/// use core_kernel::string_enum;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// pub enum Channel { Email, Sms }
///
/// string_enum!(Channel, "channel", {
///     Email => "email",
///     Sms => "sms",
/// });
///
/// assert_eq!(Channel::Sms.as_str(), "sms");
/// assert_eq!("email".parse::<Channel>().unwrap(), Channel::Email);
/// ```
#[macro_export]
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The canonical string form
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::CoreError::unknown_variant($kind, other)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::CoreError;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Sample {
        First,
        SecondValue,
    }

    string_enum!(Sample, "sample", {
        First => "first",
        SecondValue => "second_value",
    });

    #[test]
    fn test_round_trip_and_case_folding() {
        assert_eq!(Sample::SecondValue.to_string(), "second_value");
        assert_eq!(" FIRST ".parse::<Sample>().unwrap(), Sample::First);
        assert_eq!(Sample::ALL.len(), 2);
    }

    #[test]
    fn test_unknown_value() {
        let err = "third".parse::<Sample>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownVariant { kind: "sample", .. }));
    }
}
