use clap::{Parser, Subcommand, ValueEnum};
use platforms_fetcher::fetcher::ProxyConfig;
use platforms_fetcher::fetcher::platforms::instagram::AuthMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "postgrab",
    about = "Postgrab - fetch TikTok and Instagram posts and download their media",
    version,
    author
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Log debug details
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// TOML configuration file, instead of the per-user default
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Seconds allowed for resolving one post
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Attempts per page load and media download
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    #[command(flatten)]
    pub proxy: ProxyArgs,
}

#[derive(clap::Args, Debug, Default)]
pub struct ProxyArgs {
    /// Route requests through this proxy (http, https or socks5 url)
    #[arg(id = "proxy", long = "proxy", global = true)]
    pub url: Option<String>,

    /// Proxy basic auth user
    #[arg(long = "proxy-username", global = true, requires = "proxy")]
    pub username: Option<String>,

    /// Proxy basic auth password
    #[arg(long = "proxy-password", global = true, requires = "proxy")]
    pub password: Option<String>,
}

impl ProxyArgs {
    pub fn into_proxy(self) -> Option<ProxyConfig> {
        let url = self.url?;
        Some(ProxyConfig {
            url,
            username: self.username,
            password: self.password,
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a post link and print the post
    Fetch {
        /// Link to a TikTok or Instagram post
        url: String,

        /// Output format
        #[arg(short, long)]
        output: Option<OutputFormat>,

        /// Save output to file
        #[arg(short = 'O', long)]
        output_file: Option<PathBuf>,
    },

    /// Resolve a post link and download its media batch by batch
    Download {
        /// Link to a TikTok or Instagram post
        url: String,

        /// Directory the post folder is created in
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Do not write caption files
        #[arg(long)]
        no_caption: bool,
    },

    /// List supported platforms
    Platforms {
        /// Output format
        #[arg(short, long)]
        output: Option<OutputFormat>,
    },

    /// Show or change how Instagram posts are fetched
    AuthMode {
        /// New mode; prints the current one when omitted
        #[arg(value_parser = parse_auth_mode)]
        mode: Option<AuthMode>,
    },

    /// Log in to Instagram through the configured browser
    Login {
        /// Only report whether login data is present
        #[arg(long)]
        status: bool,
    },

    /// Remove Instagram login data
    Logout,

    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Print or reset the configuration file
    Config {
        /// Print the effective configuration
        #[arg(short, long)]
        show: bool,

        /// Overwrite the configuration file with defaults
        #[arg(long, conflicts_with = "show")]
        reset: bool,
    },
}

fn parse_auth_mode(s: &str) -> Result<AuthMode, String> {
    s.parse()
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Colored, indented text
    #[default]
    Pretty,
    /// Indented JSON
    Json,
    /// One-line JSON
    JsonCompact,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_auth_mode_argument() {
        let args = Args::parse_from(["postgrab", "auth-mode", "authenticated"]);
        assert!(matches!(
            args.command,
            Commands::AuthMode {
                mode: Some(AuthMode::Authenticated)
            }
        ));

        assert!(Args::try_parse_from(["postgrab", "auth-mode", "sometimes"]).is_err());
    }

    #[test]
    fn test_proxy_arguments() {
        let args = Args::parse_from([
            "postgrab",
            "platforms",
            "--proxy",
            "socks5://127.0.0.1:1080",
            "--proxy-username",
            "me",
        ]);
        let proxy = args.proxy.into_proxy().unwrap();
        assert_eq!(proxy.url, "socks5://127.0.0.1:1080");
        assert_eq!(proxy.username.as_deref(), Some("me"));
        assert!(proxy.password.is_none());

        let args = Args::parse_from(["postgrab", "logout"]);
        assert!(args.proxy.into_proxy().is_none());
    }
}
