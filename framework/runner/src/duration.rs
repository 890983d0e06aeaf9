use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The token did not match `[0-9]+[smh]`, or the amount was zero or too large to be a number
/// of seconds.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq, Eq)]
#[display("Duration must match pattern [0-9]+[smh], but it was '{token}'")]
pub struct InvalidDurationFormat {
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationUnit {
    Seconds,
    Minutes,
    Hours,
}

impl DurationUnit {
    fn letter(&self) -> char {
        match self {
            DurationUnit::Seconds => 's',
            DurationUnit::Minutes => 'm',
            DurationUnit::Hours => 'h',
        }
    }

    fn secs_per_unit(&self) -> u64 {
        match self {
            DurationUnit::Seconds => 1,
            DurationUnit::Minutes => 60,
            DurationUnit::Hours => 3600,
        }
    }
}

/// A validated stress run duration, parsed from a `[0-9]+[smh]` token.
///
/// The original token shape is preserved by [`fmt::Display`] because cassandra-stress takes the
/// token verbatim as its `duration=` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StressDuration {
    amount: u64,
    unit: DurationUnit,
}

impl StressDuration {
    pub fn as_secs(&self) -> u64 {
        self.amount * self.unit.secs_per_unit()
    }

    pub fn as_std(&self) -> Duration {
        Duration::from_secs(self.as_secs())
    }
}

impl FromStr for StressDuration {
    type Err = InvalidDurationFormat;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidDurationFormat {
            token: token.to_string(),
        };

        if !token.is_ascii() || token.len() < 2 {
            return Err(invalid());
        }
        let (digits, unit) = token.split_at(token.len() - 1);
        let unit = match unit {
            "s" => DurationUnit::Seconds,
            "m" => DurationUnit::Minutes,
            "h" => DurationUnit::Hours,
            _ => return Err(invalid()),
        };
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let amount: u64 = digits.parse().map_err(|_| invalid())?;
        if amount == 0 {
            return Err(invalid());
        }
        // Rejecting oversized amounts here keeps as_secs a plain multiplication.
        amount
            .checked_mul(unit.secs_per_unit())
            .ok_or_else(invalid)?;

        Ok(Self { amount, unit })
    }
}

impl fmt::Display for StressDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.letter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_tokens() {
        let cases = [
            ("1s", 1),
            ("30s", 30),
            ("2m", 120),
            ("45m", 2700),
            ("1h", 3600),
            ("12h", 43200),
        ];
        for (token, secs) in cases {
            let duration: StressDuration = token.parse().expect("token should parse");
            assert_eq!(duration.as_secs(), secs, "token {token}");
            assert_eq!(duration.to_string(), token);
        }
    }

    #[test]
    fn rejects_malformed_tokens() {
        let cases = ["", "abc", "5", "5x", "-1s", "0s", "s", "5ss", "5 s", "1.5m", "٥s"];
        for token in cases {
            let result: Result<StressDuration, _> = token.parse();
            let err = result.expect_err(&format!("token '{token}' should be rejected"));
            assert_eq!(err.token, token);
        }
    }

    #[test]
    fn rejects_amounts_whose_seconds_overflow() {
        // u64::MAX seconds is 18446744073709551615, so these all overflow once converted.
        let cases = ["9999999999999999999h", "18446744073709551615m", "99999999999999999999s"];
        for token in cases {
            let result: Result<StressDuration, _> = token.parse();
            let err = result.expect_err(&format!("token '{token}' should be rejected"));
            assert_eq!(err.token, token);
        }
        // The boundary itself still fits in seconds.
        let max: StressDuration = "18446744073709551615s".parse().expect("fits in u64 seconds");
        assert_eq!(max.as_secs(), u64::MAX);
    }

    #[test]
    fn error_names_the_offending_token() {
        let err = "5x".parse::<StressDuration>().expect_err("should fail");
        assert!(err.to_string().contains("'5x'"));
    }
}
