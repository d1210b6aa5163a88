use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vdr_dbus::config::{self, Config};
use vdr_dbus::facility::{ChannelList, EpgEvents, Facility, Vdr};
use vdr_dbus::{Readiness, VdrClient, VdrSignal};

#[derive(Parser)]
#[command(name = "vdrctl")]
#[command(author, version, about = "Control VDR over D-Bus", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// VDR instance index (overrides the config file)
    #[arg(short, long, global = true)]
    instance: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show VDR status and replay state
    Status,

    /// Query channels
    Channels {
        #[command(subcommand)]
        action: ChannelAction,
    },

    /// Query the EPG
    Epg {
        #[command(subcommand)]
        action: EpgAction,
    },

    /// Press remote-control keys (e.g. "Menu", "Ok", "Channel+")
    Key {
        /// Keys to send, in order
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Show a message on the OSD
    Message {
        text: String,
    },

    /// Get or set the volume (<0-255>, +, - or mute)
    Volume {
        value: Option<String>,
    },

    /// Query timers
    Timers {
        #[command(subcommand)]
        action: TimerAction,
    },

    /// Query plugins
    Plugins {
        #[command(subcommand)]
        action: PluginAction,
    },

    /// Print VDR's signals until interrupted
    Watch {
        /// Signal members to print
        #[arg(long = "member", default_values = ["Start", "Ready", "Stop", "AskUserSelect"])]
        members: Vec<String>,
    },

    /// Configure settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
enum ChannelAction {
    /// Number of channels
    Count,
    /// Channels matching groups|<number>|<name>|<id>
    List { filter: String },
    /// Channels between two indices
    Range { from: i32, to: i32 },
}

#[derive(Subcommand)]
enum EpgAction {
    /// Current events (all channels if none given)
    Now { channel: Option<String> },
    /// Following events (all channels if none given)
    Next { channel: Option<String> },
    /// Events at a point in time (seconds since epoch)
    At { channel: String, time: u64 },
}

#[derive(Subcommand)]
enum TimerAction {
    /// List timers
    List,
    /// Show the next timer
    Next,
}

#[derive(Subcommand)]
enum PluginAction {
    /// List loaded plugins
    List,
    /// Check whether a plugin is loaded
    Check { name: String },
    /// Send an SVDRP command to a plugin
    Svdrp {
        plugin: String,
        command: String,
        #[arg(default_value = "")]
        args: String,
    },
}

fn init_logging(verbose: bool, level: &str) {
    let filter = if verbose {
        EnvFilter::new("vdr_dbus=debug,vdrctl=debug,zbus=info")
    } else {
        EnvFilter::new(format!("vdr_dbus={level},vdrctl={level},zbus=warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Connect and make sure the modules are built.
async fn connect_ready(config: &Config) -> anyhow::Result<VdrClient> {
    let client = VdrClient::connect(&config.bus).await?;
    if client.readiness().await != Readiness::Ready && !client.check_status().await {
        anyhow::bail!("VDR at {} is not ready", client.endpoint().service());
    }
    Ok(client)
}

fn require<T>(module: Option<T>, facility: Facility) -> anyhow::Result<T> {
    module.ok_or_else(|| {
        anyhow::anyhow!(
            "{} module is not loaded (check [bus].modules in the config)",
            facility
        )
    })
}

fn print_channels((channels, code, message): ChannelList) {
    for (number, line) in channels {
        println!("{:>5} {}", number, line);
    }
    if channels_failed(code) {
        println!("{} {}", code, message);
    }
}

fn print_events((code, message, events): EpgEvents) {
    println!("{} {}", code, message);
    for event in events {
        for (key, value) in event {
            println!("  {}: {:?}", key, value);
        }
        println!();
    }
}

/// A missing plugin is an error so the exit status reflects it.
fn report_plugin(name: &str, loaded: bool) -> anyhow::Result<()> {
    if !loaded {
        anyhow::bail!("{} is not loaded", name);
    }
    println!("{} is loaded", name);
    Ok(())
}

fn channels_failed(code: i32) -> bool {
    code != 250
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::config_path()?,
    };

    if let Commands::Config { show } = cli.command {
        init_logging(cli.verbose, "info");
        if show {
            config::show(&config_path)?;
        } else {
            println!("Config file: {}", config_path.display());
        }
        return Ok(());
    }

    let created = !config_path.exists();
    let mut config = Config::load_from(&config_path)?;
    if let Some(instance) = cli.instance {
        config.bus.instance = instance;
    }
    init_logging(cli.verbose, &config.logging.level.to_ascii_lowercase());
    if created {
        info!("Wrote default config to {}", config_path.display());
    }

    match cli.command {
        Commands::Status => {
            let client = VdrClient::connect(&config.bus).await?;
            let vdr = Vdr::new(client.connection(), client.endpoint()).await?;
            let status = vdr.status_raw().await?;
            println!("{}: {}", client.endpoint().service(), status);

            if client.check_status().await {
                if let Some(replay) = client.status().await {
                    let (title, path, active) = replay.is_replaying().await?;
                    if active {
                        println!("Replaying: {} ({})", title, path);
                    } else {
                        println!("Not replaying");
                    }
                }
            }
        }

        Commands::Channels { action } => {
            let client = connect_ready(&config).await?;
            let channels = require(client.channels().await, Facility::Channels)?;
            match action {
                ChannelAction::Count => println!("{}", channels.count().await?),
                ChannelAction::List { filter } => print_channels(channels.list(&filter).await?),
                ChannelAction::Range { from, to } => {
                    print_channels(channels.get_from_to(from, to).await?)
                }
            }
        }

        Commands::Epg { action } => {
            let client = connect_ready(&config).await?;
            let epg = require(client.epg().await, Facility::Epg)?;
            let events = match action {
                EpgAction::Now { channel } => epg.now(channel.as_deref().unwrap_or("")).await?,
                EpgAction::Next { channel } => epg.next(channel.as_deref().unwrap_or("")).await?,
                EpgAction::At { channel, time } => epg.at(&channel, time).await?,
            };
            print_events(events);
        }

        Commands::Key { keys } => {
            let client = connect_ready(&config).await?;
            let remote = require(client.remote().await, Facility::Remote)?;
            let (code, message) = if keys.len() == 1 {
                remote.hit_key(&keys[0]).await?
            } else {
                remote.hit_keys(&keys).await?
            };
            println!("{} {}", code, message);
        }

        Commands::Message { text } => {
            let client = connect_ready(&config).await?;
            let skin = require(client.skin().await, Facility::Skin)?;
            let (code, message) = skin.queue_message(&text).await?;
            println!("{} {}", code, message);
        }

        Commands::Volume { value } => {
            let client = connect_ready(&config).await?;
            let remote = require(client.remote().await, Facility::Remote)?;
            match value {
                Some(value) => {
                    let (code, message) = remote.set_volume(&value).await?;
                    println!("{} {}", code, message);
                }
                None => {
                    let (volume, muted) = remote.get_volume().await?;
                    println!("{}{}", volume, if muted { " (muted)" } else { "" });
                }
            }
        }

        Commands::Timers { action } => {
            let client = connect_ready(&config).await?;
            let timers = require(client.timers().await, Facility::Timers)?;
            match action {
                TimerAction::List => {
                    for timer in timers.list().await? {
                        println!("{}", timer);
                    }
                }
                TimerAction::Next => {
                    let (code, id, rel, start, stop, title) = timers.next().await?;
                    println!(
                        "code={} id={} in={}s start={} stop={} title={}",
                        code, id, rel, start, stop, title
                    );
                }
            }
        }

        Commands::Plugins { action } => {
            let client = connect_ready(&config).await?;
            let plugins = require(client.plugins().await, Facility::Plugins)?;
            match action {
                PluginAction::List => {
                    for (name, version) in plugins.list().await? {
                        println!("{:<20} {}", name, version);
                    }
                }
                PluginAction::Check { name } => {
                    report_plugin(&name, plugins.check_plugin(&name).await?)?;
                }
                PluginAction::Svdrp {
                    plugin,
                    command,
                    args,
                } => {
                    let (code, message) = plugins.svdrp_command(&plugin, &command, &args).await?;
                    println!("{} {}", code, message);
                }
            }
        }

        Commands::Watch { members } => {
            let client = VdrClient::connect(&config.bus).await?;
            for member in &members {
                client.on_signal(member, |signal: &VdrSignal| {
                    println!(
                        "{} {} {}{}",
                        signal.sender().unwrap_or("-"),
                        signal.path().unwrap_or("-"),
                        signal.member(),
                        if signal.is_synthetic() { " (VDR vanished)" } else { "" }
                    );
                });
            }
            info!(
                "Watching {} for {}",
                client.endpoint().service(),
                members.join(", ")
            );
            tokio::signal::ctrl_c().await?;
        }

        Commands::Config { .. } => unreachable!("handled above"),
    }

    Ok(())
}
