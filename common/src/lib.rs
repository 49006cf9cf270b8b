// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
pub mod api;
pub mod logging {
    use std::str::FromStr;
    use std::sync::Once;
    use tracing_subscriber::fmt::time::UtcTime;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter};

    static INIT: Once = Once::new();

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub enum LogFormat {
        #[default]
        Plain,
        Json,
    }

    impl FromStr for LogFormat {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_ascii_lowercase().as_str() {
                "" | "plain" | "text" => Ok(LogFormat::Plain),
                "json" => Ok(LogFormat::Json),
                other => Err(format!("unknown log format: {}", other)),
            }
        }
    }

    /// First of `PRIVPASS_LOG_FORMAT`, `LOG_FORMAT`. Unknown values fall
    /// back to plain.
    pub fn format_from_env() -> LogFormat {
        ["PRIVPASS_LOG_FORMAT", "LOG_FORMAT"]
            .iter()
            .find_map(|k| std::env::var(k).ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    /// `PRIVPASS_LOG`, then `RUST_LOG`, then `default_filter`, then "info".
    pub fn filter_from_env(default_filter: &str) -> EnvFilter {
        EnvFilter::try_from_env("PRIVPASS_LOG")
            .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
            .or_else(|_| EnvFilter::try_new(default_filter))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// Install the global subscriber. Logs go to stderr so that command
    /// output on stdout stays machine-readable. Later calls are no-ops.
    pub fn init(default_filter: &str) {
        init_with(format_from_env(), filter_from_env(default_filter));
    }

    pub fn init_with(format: LogFormat, filter: EnvFilter) {
        INIT.call_once(|| {
            let (plain, json) = match format {
                LogFormat::Plain => (
                    Some(
                        fmt::layer()
                            .with_writer(std::io::stderr)
                            .with_timer(UtcTime::rfc_3339())
                            .with_ansi(cfg!(unix)),
                    ),
                    None,
                ),
                LogFormat::Json => (
                    None,
                    Some(
                        fmt::layer()
                            .json()
                            .with_writer(std::io::stderr)
                            .with_timer(UtcTime::rfc_3339())
                            .with_current_span(false),
                    ),
                ),
            };

            // an embedding application may already own the global subscriber
            let installed = tracing_subscriber::registry()
                .with(filter)
                .with(plain)
                .with(json)
                .try_init()
                .is_ok();
            tracing::debug!(?format, installed, "logging initialized");
        });
    }

}
