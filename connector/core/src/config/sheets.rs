//! Sheet Catalogue
//!
//! Names of the eleven sheets in the backing spreadsheet. The connector
//! itself never addresses sheets (the backend script does); the catalogue is
//! exposed so host code can show or log the layout it is talking to.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One logical sheet
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetKind {
    /// Job seeker master
    JobSeekers,
    /// Job listing master
    JobListings,
    /// Company master
    Companies,
    /// Applications
    Applications,
    /// Interview schedule
    Interviews,
    /// Contracts and onboarding
    Contracts,
    /// Activity log
    ActivityLog,
    /// Monthly statistics
    MonthlyStats,
    /// KPI dashboard
    KpiDashboard,
    /// System settings
    SystemSettings,
    /// User management
    UserManagement,
}

impl SheetKind {
    /// Every sheet, in catalogue order
    pub const ALL: [SheetKind; 11] = [
        SheetKind::JobSeekers,
        SheetKind::JobListings,
        SheetKind::Companies,
        SheetKind::Applications,
        SheetKind::Interviews,
        SheetKind::Contracts,
        SheetKind::ActivityLog,
        SheetKind::MonthlyStats,
        SheetKind::KpiDashboard,
        SheetKind::SystemSettings,
        SheetKind::UserManagement,
    ];

    /// Name of the sheet in the stock spreadsheet
    #[must_use]
    pub fn default_name(self) -> &'static str {
        match self {
            Self::JobSeekers => "求職者マスタ",
            Self::JobListings => "求人マスタ",
            Self::Companies => "企業マスタ",
            Self::Applications => "応募管理",
            Self::Interviews => "面接スケジュール",
            Self::Contracts => "成約・入社管理",
            Self::ActivityLog => "アクティビティログ",
            Self::MonthlyStats => "月次統計",
            Self::KpiDashboard => "KPIダッシュボード",
            Self::SystemSettings => "システム設定",
            Self::UserManagement => "ユーザー管理",
        }
    }

    /// Key used in `[spreadsheet.sheets]`
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::JobSeekers => "job_seekers",
            Self::JobListings => "job_listings",
            Self::Companies => "companies",
            Self::Applications => "applications",
            Self::Interviews => "interviews",
            Self::Contracts => "contracts",
            Self::ActivityLog => "activity_log",
            Self::MonthlyStats => "monthly_stats",
            Self::KpiDashboard => "kpi_dashboard",
            Self::SystemSettings => "system_settings",
            Self::UserManagement => "user_management",
        }
    }

    /// Look a sheet up by its config key
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key)
    }
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Resolved sheet names
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetNames {
    names: BTreeMap<SheetKind, String>,
}

impl Default for SheetNames {
    fn default() -> Self {
        Self {
            names: SheetKind::ALL
                .into_iter()
                .map(|k| (k, k.default_name().to_string()))
                .collect(),
        }
    }
}

impl SheetNames {
    /// Name of `kind`
    #[must_use]
    pub fn get(&self, kind: SheetKind) -> &str {
        self.names
            .get(&kind)
            .map_or_else(|| kind.default_name(), String::as_str)
    }

    /// Rename one sheet
    pub fn set(&mut self, kind: SheetKind, name: impl Into<String>) {
        self.names.insert(kind, name.into());
    }

    /// All sheets with their names, in catalogue order
    pub fn iter(&self) -> impl Iterator<Item = (SheetKind, &str)> {
        SheetKind::ALL.into_iter().map(move |k| (k, self.get(k)))
    }
}
