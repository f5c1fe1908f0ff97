use clap::{Args, Parser, Subcommand, ValueEnum};
use dl_core::Tier;

#[derive(Debug, Parser)]
#[command(name = "dicelang")]
#[command(about = "Dice language interpreter runtime")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    /// Run one program against the store.
    Exec(ExecArgs),
    /// List the names bound in each tier.
    View(ViewArgs),
    /// Read JSON-lines commands from stdin until EOF.
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
pub(crate) struct RuntimeArgs {
    #[arg(long = "store")]
    pub(crate) store: Option<String>,
    #[arg(long = "core-dir")]
    pub(crate) core_dir: Option<String>,
    #[arg(long = "config")]
    pub(crate) config: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct ExecArgs {
    #[arg(long = "program")]
    pub(crate) program: String,
    #[arg(long = "user")]
    pub(crate) user: String,
    #[arg(long = "server")]
    pub(crate) server: String,
    #[command(flatten)]
    pub(crate) runtime: RuntimeArgs,
}

#[derive(Debug, Args)]
pub(crate) struct ViewArgs {
    #[arg(long = "user")]
    pub(crate) user: String,
    #[arg(long = "server")]
    pub(crate) server: String,
    #[arg(long = "tier", value_enum, default_value_t = TierFilter::All)]
    pub(crate) tier: TierFilter,
    #[command(flatten)]
    pub(crate) runtime: RuntimeArgs,
}

#[derive(Debug, Args)]
pub(crate) struct ServeArgs {
    #[command(flatten)]
    pub(crate) runtime: RuntimeArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum TierFilter {
    All,
    Global,
    Shared,
    Private,
    Core,
}

impl TierFilter {
    /// Tiers in listing order.
    pub(crate) fn tiers(self) -> Vec<Tier> {
        match self {
            Self::All => vec![Tier::Global, Tier::Shared, Tier::Private, Tier::Core],
            Self::Global => vec![Tier::Global],
            Self::Shared => vec![Tier::Shared],
            Self::Private => vec![Tier::Private],
            Self::Core => vec![Tier::Core],
        }
    }
}
