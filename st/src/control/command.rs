//! Administrative commands and their replies

use serde::{Deserialize, Serialize};

/// A command accepted by the control surface
///
/// Serialized with the command prefix as the tag, e.g.
/// `{"prefix": "self-test background start", "workload": "command_spam"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "prefix")]
pub enum ControlCommand {
    #[serde(rename = "self-test run")]
    SelfTestRun,

    #[serde(rename = "self-test background start")]
    BackgroundStart { workload: String },

    #[serde(rename = "self-test background stop")]
    BackgroundStop,

    #[serde(rename = "self-test config get")]
    ConfigGet { key: String },

    #[serde(rename = "self-test config get_localized")]
    ConfigGetLocalized { key: String },

    #[serde(rename = "self-test remote")]
    Remote,
}

impl ControlCommand {
    /// Every prefix the control surface answers to
    pub const PREFIXES: [&'static str; 6] = [
        "self-test run",
        "self-test background start",
        "self-test background stop",
        "self-test config get",
        "self-test config get_localized",
        "self-test remote",
    ];

    pub fn is_known_prefix(prefix: &str) -> bool {
        Self::PREFIXES.contains(&prefix)
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            ControlCommand::SelfTestRun => "self-test run",
            ControlCommand::BackgroundStart { .. } => "self-test background start",
            ControlCommand::BackgroundStop => "self-test background stop",
            ControlCommand::ConfigGet { .. } => "self-test config get",
            ControlCommand::ConfigGetLocalized { .. } => "self-test config get_localized",
            ControlCommand::Remote => "self-test remote",
        }
    }
}

/// Status code plus output of a control command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    /// 0 on success, negative errno on failure
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandReply {
    pub fn ok(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn error(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_cover_every_command() {
        let commands = [
            ControlCommand::SelfTestRun,
            ControlCommand::BackgroundStart {
                workload: "command_spam".into(),
            },
            ControlCommand::BackgroundStop,
            ControlCommand::ConfigGet { key: "k".into() },
            ControlCommand::ConfigGetLocalized { key: "k".into() },
            ControlCommand::Remote,
        ];
        for command in &commands {
            assert!(ControlCommand::is_known_prefix(command.prefix()));
        }
        assert!(!ControlCommand::is_known_prefix("self-test fly"));
    }

    #[test]
    fn test_command_wire_format() {
        let cmd = ControlCommand::BackgroundStart {
            workload: "command_spam".to_string(),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["prefix"], "self-test background start");
        assert_eq!(json["workload"], "command_spam");

        let parsed: ControlCommand =
            serde_json::from_str(r#"{"prefix": "self-test config get_localized", "key": "testlkey"}"#).unwrap();
        assert_eq!(
            parsed,
            ControlCommand::ConfigGetLocalized {
                key: "testlkey".to_string()
            }
        );
    }

    #[test]
    fn test_prefix_matches_serialized_tag() {
        let commands = [
            ControlCommand::SelfTestRun,
            ControlCommand::BackgroundStart { workload: "w".into() },
            ControlCommand::BackgroundStop,
            ControlCommand::ConfigGet { key: "k".into() },
            ControlCommand::ConfigGetLocalized { key: "k".into() },
            ControlCommand::Remote,
        ];
        for cmd in commands {
            let json = serde_json::to_value(&cmd).unwrap();
            assert_eq!(json["prefix"], cmd.prefix());
        }
    }

    #[test]
    fn test_unknown_prefix_rejected() {
        let parsed = serde_json::from_str::<ControlCommand>(r#"{"prefix": "self-test fly"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_reply_constructors() {
        assert!(CommandReply::ok("", "done").is_success());
        let err = CommandReply::error(-22, "bad");
        assert!(!err.is_success());
        assert!(err.stdout.is_empty());
    }
}
