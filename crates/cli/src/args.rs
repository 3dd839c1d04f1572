//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use connectum_domain::Timeframe;
use std::path::PathBuf;

/// connectum: multilingual Q&A feed with realtime sync, XP and translation
#[derive(Parser, Debug)]
#[command(name = "connectum")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the translation proxy server
    Serve(ServeArgs),

    /// Load and print the question feed
    Feed(FeedArgs),

    /// Post a question
    Ask(AskArgs),

    /// Post an answer to a question
    Answer(AnswerArgs),

    /// Like or unlike a question
    Like(LikeArgs),

    /// Mark a reply as the best answer
    Best(BestArgs),

    /// Show XP, level and progress
    Profile(ProfileArgs),

    /// List the top profiles by XP
    Leaderboard(LeaderboardArgs),

    /// Translate text, using the local cache
    Translate(TranslateArgs),

    /// Upload an avatar image and print its public URL
    UploadAvatar(UploadAvatarArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Override the bind address (host:port)
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Args, Debug)]
pub struct FeedArgs {
    /// Keep syncing and reprint on change until Ctrl+C
    #[arg(long)]
    pub watch: bool,

    /// Only show questions matching this text
    #[arg(long)]
    pub search: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Question text
    #[arg(long)]
    pub text: String,

    /// Source language name (e.g. "Ukrainian")
    #[arg(long)]
    pub language: Option<String>,

    /// Category label
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Args, Debug)]
pub struct AnswerArgs {
    /// Question id
    #[arg(long)]
    pub question: String,

    /// Answer text
    #[arg(long)]
    pub text: String,
}

#[derive(Args, Debug)]
pub struct LikeArgs {
    /// Question id
    #[arg(long)]
    pub question: String,
}

#[derive(Args, Debug)]
pub struct BestArgs {
    /// Reply id
    #[arg(long)]
    pub reply: String,
}

#[derive(Args, Debug)]
pub struct ProfileArgs {
    /// User id (defaults to the configured session user)
    #[arg(long)]
    pub user: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct LeaderboardArgs {
    /// Window: all, monthly or weekly
    #[arg(long, default_value = "all")]
    pub timeframe: Timeframe,

    /// Number of profiles to show
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct TranslateArgs {
    /// Text to translate
    #[arg(long)]
    pub text: String,

    /// Two-letter target language (defaults to the configured locale)
    #[arg(long)]
    pub target: Option<String>,
}

#[derive(Args, Debug)]
pub struct UploadAvatarArgs {
    /// Image file to upload
    #[arg(long)]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./connectum.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration after file and environment overrides
    Show,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
