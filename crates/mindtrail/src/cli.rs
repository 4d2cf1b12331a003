use clap::{Parser, Subcommand, ValueEnum};
use mindtrail_store::SearchMode;

#[derive(Parser)]
#[command(name = "mindtrail")]
#[command(version)]
#[command(about = "Persistent memory for AI coding assistants")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print version information
    Version,

    /// Hook: Session start, prints recent memory as context
    #[command(name = "hook:session-start")]
    HookSessionStart,

    /// Hook: Capture one tool execution (stdin JSON)
    #[command(name = "hook:post-tool-use")]
    HookPostToolUse,

    /// Hook: Write the session summary
    #[command(name = "hook:stop")]
    HookStop,

    /// Search stored observations
    Search {
        query: String,

        /// Maximum number of hits
        #[arg(short, default_value_t = 10)]
        k: usize,

        #[arg(long, value_enum, default_value_t = ModeArg::Auto)]
        mode: ModeArg,
    },

    /// Ask a question against stored observations
    Ask {
        question: String,

        #[arg(short, default_value_t = 10)]
        k: usize,
    },

    /// Show store statistics
    Stats,

    /// List recent observations
    Timeline {
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Oldest observations first
        #[arg(long)]
        oldest_first: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Lex,
    Auto,
}

impl From<ModeArg> for SearchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Lex => SearchMode::Lex,
            ModeArg::Auto => SearchMode::Auto,
        }
    }
}
