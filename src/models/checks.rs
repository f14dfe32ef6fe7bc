use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::tasks::CheckSpec;

/// Declared expectation against a registry value (or bare key when
/// `value_name` is empty).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryCheck {
    pub id: Uuid,
    pub name: String,
    pub registry_path: String,
    pub value_name: Option<String>,
    pub expected_value: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl RegistryCheck {
    pub fn spec(&self) -> CheckSpec {
        CheckSpec::Registry {
            name: Some(self.name.clone()),
            registry_path: self.registry_path.clone(),
            value_name: self.value_name.clone(),
            expected_value: self.expected_value.clone(),
        }
    }
}

/// Declared expectation about a file or directory path. Existence is the
/// only gating condition; attributes ride along as informational data.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCheck {
    pub id: Uuid,
    pub name: String,
    pub file_path: String,
    pub check_exists: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl FileCheck {
    pub fn spec(&self) -> CheckSpec {
        CheckSpec::File {
            name: Some(self.name.clone()),
            file_path: self.file_path.clone(),
            check_exists: Some(self.check_exists),
        }
    }
}

/// Declared expectation about a Windows service, addressed by service name
/// or by the executable backing it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCheck {
    pub id: Uuid,
    pub name: String,
    pub service_name: Option<String>,
    pub executable_path: Option<String>,
    pub expected_status: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ServiceCheck {
    pub fn spec(&self) -> CheckSpec {
        CheckSpec::Service {
            name: Some(self.name.clone()),
            service_name: self.service_name.clone(),
            executable_path: self.executable_path.clone(),
            expected_status: self.expected_status.clone(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCheck {
    pub id: Uuid,
    pub name: String,
    pub check_type: String, // Will be converted to/from UserCheckKind enum
    pub custom_script: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl UserCheck {
    pub fn spec(&self) -> CheckSpec {
        CheckSpec::User {
            name: Some(self.name.clone()),
            kind: UserCheckKind::parse(&self.check_type),
            custom_script: self.custom_script.clone(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemCheck {
    pub id: Uuid,
    pub name: String,
    pub check_type: String, // Will be converted to/from SystemCheckKind enum
    pub custom_script: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl SystemCheck {
    pub fn spec(&self) -> CheckSpec {
        CheckSpec::System {
            name: Some(self.name.clone()),
            kind: SystemCheckKind::parse(&self.check_type),
            custom_script: self.custom_script.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserCheckKind {
    #[default]
    CurrentAndLast,
    CurrentOnly,
    LastOnly,
    Custom,
}

impl UserCheckKind {
    /// Unknown strings fall back to the combined check rather than failing;
    /// definitions are operator-edited and the engine must stay runnable.
    pub fn parse(s: &str) -> Self {
        match s {
            "CURRENT_AND_LAST" => UserCheckKind::CurrentAndLast,
            "CURRENT_ONLY" => UserCheckKind::CurrentOnly,
            "LAST_ONLY" => UserCheckKind::LastOnly,
            "CUSTOM" => UserCheckKind::Custom,
            _ => UserCheckKind::CurrentAndLast,
        }
    }
}

impl std::fmt::Display for UserCheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserCheckKind::CurrentAndLast => write!(f, "CURRENT_AND_LAST"),
            UserCheckKind::CurrentOnly => write!(f, "CURRENT_ONLY"),
            UserCheckKind::LastOnly => write!(f, "LAST_ONLY"),
            UserCheckKind::Custom => write!(f, "CUSTOM"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SystemCheckKind {
    #[default]
    SystemInfo,
    Custom,
}

impl SystemCheckKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "SYSTEM_INFO" => SystemCheckKind::SystemInfo,
            "CUSTOM" => SystemCheckKind::Custom,
            _ => SystemCheckKind::SystemInfo,
        }
    }
}

impl std::fmt::Display for SystemCheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemCheckKind::SystemInfo => write!(f, "SYSTEM_INFO"),
            SystemCheckKind::Custom => write!(f, "CUSTOM"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_kind_defaults_to_combined_check() {
        assert_eq!(UserCheckKind::parse("CURRENT_ONLY"), UserCheckKind::CurrentOnly);
        assert_eq!(UserCheckKind::parse("bogus"), UserCheckKind::CurrentAndLast);
        assert_eq!(UserCheckKind::parse(""), UserCheckKind::CurrentAndLast);
    }

    #[test]
    fn system_kind_defaults_to_inventory_probe() {
        assert_eq!(SystemCheckKind::parse("CUSTOM"), SystemCheckKind::Custom);
        assert_eq!(SystemCheckKind::parse("anything"), SystemCheckKind::SystemInfo);
    }
}
