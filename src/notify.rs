use log::warn;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::NotificationConfig;
use crate::error::Error;

const MESSAGE_TOKEN: &str = "_NOTIFICATION_MESSAGE_";
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends alerts by running a configured CLI tool.
pub struct Notifier {
    config: NotificationConfig,
}

impl Notifier {
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    /// Resolves `<VAR>` and message tokens. Fails on a missing environment
    /// variable before anything is spawned.
    fn expand_args(&self, message: &str) -> Result<Vec<String>, Error> {
        self.config
            .cli_args
            .iter()
            .map(|arg| {
                if arg == MESSAGE_TOKEN {
                    Ok(message.to_string())
                } else if let Some(name) =
                    arg.strip_prefix('<').and_then(|a| a.strip_suffix('>'))
                {
                    dotenvy::var(name).map_err(|_| Error::MissingEnvVar(name.to_string()))
                } else {
                    Ok(arg.clone())
                }
            })
            .collect()
    }

    pub async fn send(&self, message: &str) -> Result<(), Error> {
        let args = self.expand_args(message)?;

        let output = timeout(
            COMMAND_TIMEOUT,
            Command::new(&self.config.tool)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .output(),
        )
        .await
        .map_err(|_| Error::NotificationTimeout(self.config.tool.clone()))??;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                warn!("notification command stderr: {}", stderr.trim());
            }
            Err(Error::NotificationFailed {
                tool: self.config.tool.clone(),
                status: output.status,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier(tool: &str, cli_args: &[&str]) -> Notifier {
        Notifier::new(NotificationConfig {
            tool: tool.to_string(),
            cli_args: cli_args.iter().map(|arg| (*arg).to_string()).collect(),
        })
    }

    #[test]
    fn test_expand_args_substitutes_tokens() {
        // set_var is unsafe since the 2024 edition; this test owns the var
        unsafe { std::env::set_var("ROUTE_WATCH_TEST_TOKEN", "tok123") };

        let notifier = notifier(
            "telegram_notifier",
            &[
                "send",
                "--token",
                "<ROUTE_WATCH_TEST_TOKEN>",
                "--message",
                "_NOTIFICATION_MESSAGE_",
            ],
        );
        let args = notifier.expand_args("Traffic alert").unwrap();

        assert_eq!(
            args,
            vec!["send", "--token", "tok123", "--message", "Traffic alert"]
        );
    }

    #[test]
    fn test_expand_args_missing_env_var() {
        let notifier = notifier("tool", &["<ROUTE_WATCH_TEST_UNSET_VAR>"]);
        assert!(matches!(
            notifier.expand_args("msg"),
            Err(Error::MissingEnvVar(name)) if name == "ROUTE_WATCH_TEST_UNSET_VAR"
        ));
    }

    #[test]
    fn test_expand_args_leaves_plain_args_alone() {
        let notifier = notifier("mail", &["-s", "Traffic Alert", "ops@example.com"]);
        let args = notifier.expand_args("msg").unwrap();
        assert_eq!(args, vec!["-s", "Traffic Alert", "ops@example.com"]);
    }

    #[tokio::test]
    async fn test_send_success() {
        let notifier = notifier("true", &["_NOTIFICATION_MESSAGE_"]);
        assert!(notifier.send("test").await.is_ok());
    }

    #[tokio::test]
    async fn test_send_nonzero_exit_is_an_error() {
        let notifier = notifier("false", &[]);
        assert!(matches!(
            notifier.send("test").await,
            Err(Error::NotificationFailed { tool, .. }) if tool == "false"
        ));
    }

    #[tokio::test]
    async fn test_missing_env_var_fails_before_spawn() {
        // the tool does not exist, but the env lookup must fail first
        let notifier = notifier(
            "route-watch-no-such-tool",
            &["<ROUTE_WATCH_TEST_UNSET_VAR>"],
        );
        assert!(matches!(
            notifier.send("test").await,
            Err(Error::MissingEnvVar(_))
        ));
    }
}
