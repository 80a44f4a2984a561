//! Group chat client for SignalR-style real-time hubs.
//!
//! Connects to a hub, joins a group, and sends every line typed at the
//! prompt to that group. Typing indicators of other group members are shown
//! as they arrive. A dropped connection is re-established automatically.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hubchat -- --user Alice --group lobby
//! cargo run --bin hubchat -- -u http://localhost:5000/chathub -n Bob -g lobby
//! ```

use clap::{Parser, ValueEnum};

use hubchat_client::{
    ClientConfig, EchoMode, config::DEFAULT_HUB_URL, domain::RenewalPolicy, ui::run_client,
};
use hubchat_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "hubchat")]
#[command(about = "Group chat client for SignalR-style real-time hubs", long_about = None)]
struct Args {
    /// Hub URL
    #[arg(short = 'u', long, default_value = DEFAULT_HUB_URL)]
    url: String,

    /// Your name as shown to other group members
    #[arg(short = 'n', long)]
    user: Option<String>,

    /// Group to join once connected
    #[arg(short = 'g', long)]
    group: Option<String>,

    /// How your own messages are recorded
    #[arg(long, value_enum, default_value_t = EchoArg::Optimistic)]
    echo: EchoArg,

    /// What a repeated typing notification does to a user's indicator
    #[arg(long, value_enum, default_value_t = RenewalArg::Independent)]
    typing_renewal: RenewalArg,

    /// Connect to the hub URL directly without negotiating
    #[arg(long)]
    skip_negotiation: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EchoArg {
    /// Show the message as soon as the hub accepts it
    Optimistic,
    /// Show the message when the hub broadcasts it back
    Broadcast,
}

impl From<EchoArg> for EchoMode {
    fn from(arg: EchoArg) -> Self {
        match arg {
            EchoArg::Optimistic => Self::Optimistic,
            EchoArg::Broadcast => Self::Broadcast,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RenewalArg {
    /// Each notification hides the user 3 seconds after it arrived
    Independent,
    /// A newer notification extends the indicator
    Reset,
}

impl From<RenewalArg> for RenewalPolicy {
    fn from(arg: RenewalArg) -> Self {
        match arg {
            RenewalArg::Independent => Self::Independent,
            RenewalArg::Reset => Self::ResetOnRenewal,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let config = ClientConfig {
        echo_mode: args.echo.into(),
        typing_renewal: args.typing_renewal.into(),
        skip_negotiation: args.skip_negotiation,
        ..ClientConfig::new(args.url)
    };

    run_client(config, args.user, args.group).await;
}
