//! Probe outcome type and its wire form.

use serde::{Deserialize, Serialize};

/// What a successful probe learned about the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotProfile {
    pub app_id: String,
    pub bot_name: Option<String>,
    pub bot_open_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub app_id: Option<String>,
    pub error: String,
}

/// Outcome of one connectivity check. Immutable once produced; cached
/// and handed to every coalesced waiter as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ProbeReport", try_from = "ProbeReport")]
pub enum ProbeResult {
    Success(BotProfile),
    Failure(ProbeFailure),
}

impl ProbeResult {
    pub fn success(
        app_id: impl Into<String>,
        bot_name: Option<String>,
        bot_open_id: Option<String>,
    ) -> Self {
        Self::Success(BotProfile {
            app_id: app_id.into(),
            bot_name,
            bot_open_id,
        })
    }

    pub fn failure(app_id: Option<String>, error: impl Into<String>) -> Self {
        Self::Failure(ProbeFailure {
            app_id,
            error: error.into(),
        })
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn app_id(&self) -> Option<&str> {
        match self {
            Self::Success(p) => Some(&p.app_id),
            Self::Failure(f) => f.app_id.as_deref(),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(f) => Some(&f.error),
        }
    }
}

/// Flat JSON form: `{ok, appId?, botName?, botOpenId?, error?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProbeReport {
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bot_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bot_open_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<ProbeResult> for ProbeReport {
    fn from(result: ProbeResult) -> Self {
        match result {
            ProbeResult::Success(p) => Self {
                ok: true,
                app_id: Some(p.app_id),
                bot_name: p.bot_name,
                bot_open_id: p.bot_open_id,
                error: None,
            },
            ProbeResult::Failure(f) => Self {
                ok: false,
                app_id: f.app_id,
                bot_name: None,
                bot_open_id: None,
                error: Some(f.error),
            },
        }
    }
}

impl TryFrom<ProbeReport> for ProbeResult {
    type Error = String;

    /// A success always names its app and a failure always carries an
    /// error; reports missing either are rejected.
    fn try_from(report: ProbeReport) -> Result<Self, Self::Error> {
        if report.ok {
            let app_id = report.app_id.ok_or("successful result without appId")?;
            Ok(Self::success(app_id, report.bot_name, report.bot_open_id))
        } else {
            let error = report.error.ok_or("failed result without error")?;
            Ok(Self::failure(report.app_id, error))
        }
    }
}
