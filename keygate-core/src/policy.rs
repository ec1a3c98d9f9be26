//! Password policy enforcement.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Password rules applied at registration, change, and reset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// Minimum length required.
    pub min_length: u16,
    /// Require at least one uppercase letter.
    pub require_uppercase: bool,
    /// Require at least one lowercase letter.
    pub require_lowercase: bool,
    /// Require at least one number.
    pub require_number: bool,
    /// Require at least one non-alphanumeric character.
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: false,
            require_lowercase: false,
            require_number: false,
            require_special: false,
        }
    }
}

impl PasswordPolicy {
    /// Evaluate a password against the policy returning failed rule labels.
    pub fn check(&self, password: &str) -> PasswordPolicyCheck {
        let mut failures = Vec::new();

        if password.len() < self.min_length as usize {
            failures.push(PasswordPolicyRule::MinLength(self.min_length));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            failures.push(PasswordPolicyRule::Uppercase);
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            failures.push(PasswordPolicyRule::Lowercase);
        }
        if self.require_number && !password.chars().any(|c| c.is_ascii_digit()) {
            failures.push(PasswordPolicyRule::Number);
        }
        if self.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
            failures.push(PasswordPolicyRule::Special);
        }

        PasswordPolicyCheck { failures }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordPolicyRule {
    MinLength(u16),
    Uppercase,
    Lowercase,
    Number,
    Special,
}

impl fmt::Display for PasswordPolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinLength(len) => {
                write!(f, "minimum length of {} characters", len)
            }
            Self::Uppercase => write!(f, "at least one uppercase letter"),
            Self::Lowercase => write!(f, "at least one lowercase letter"),
            Self::Number => write!(f, "at least one number"),
            Self::Special => write!(f, "at least one special character"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicyCheck {
    pub failures: Vec<PasswordPolicyRule>,
}

impl PasswordPolicyCheck {
    pub fn is_satisfied(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_only_checks_length() {
        let policy = PasswordPolicy::default();
        assert!(policy.check("longenough").is_satisfied());
        assert_eq!(
            policy.check("short").failures,
            vec![PasswordPolicyRule::MinLength(8)]
        );
    }

    #[test]
    fn strict_policy_reports_all_failures() {
        let policy = PasswordPolicy {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_number: true,
            require_special: true,
        };

        let check = policy.check("alllower");
        assert!(check.failures.contains(&PasswordPolicyRule::Uppercase));
        assert!(check.failures.contains(&PasswordPolicyRule::Number));
        assert!(check.failures.contains(&PasswordPolicyRule::Special));
        assert!(!check.failures.contains(&PasswordPolicyRule::Lowercase));

        assert!(policy.check("Secr3t!pass").is_satisfied());
    }
}
