use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "houtong")]
#[command(about = "Houtong walking-tour LINE bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory with a default config.json and an editable script.yaml.
    Init {
        /// Config file path (default: HOUTONG_CONFIG_PATH or ~/.houtong/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the LINE webhook gateway. Needs CHANNEL_SECRET and CHANNEL_ACCESS_TOKEN (or the config equivalents).
    Gateway {
        /// Config file path (default: HOUTONG_CONFIG_PATH or ~/.houtong/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 15152)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Load and validate the tour script without starting anything.
    Check {
        /// Config file path (default: HOUTONG_CONFIG_PATH or ~/.houtong/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Play the tour in the terminal, as a LINE user would see it (text only).
    Play {
        /// Config file path (default: HOUTONG_CONFIG_PATH or ~/.houtong/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Name used in the welcome message.
        #[arg(long, default_value = "旅人")]
        name: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("houtong {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Check { config }) => {
            if let Err(e) = run_check(config) {
                eprintln!("script check failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Play { config, name }) => {
            if let Err(e) = run_play(config, name).await {
                log::error!("play failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_gateway(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!("starting gateway on {}:{}", config.gateway.bind, config.gateway.port);
    lib::gateway::run_gateway(config, path).await
}

fn run_check(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    let engine = lib::tour::engine_from_config(&config, &path)?;
    let script = engine.dispatcher().script();
    match lib::config::resolve_script_path(&config, &path) {
        Some(p) => println!("script: {}", p.display()),
        None => println!("script: (bundled)"),
    }
    for rule in &script.rules {
        let from = if rule.from.is_empty() {
            "*".to_string()
        } else {
            rule.from
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(",")
        };
        println!(
            "  {:<22} {:<40} -> {:<28} {} message(s)  [{}]",
            rule.id,
            from,
            rule.next.as_str(),
            rule.responses.len(),
            rule.match_text.join(" | ")
        );
    }
    println!("ok: {} rule(s)", script.rules.len());
    Ok(())
}

/// Offline walkthrough: one local user, same engine and rules as the webhook.
async fn run_play(config_path: Option<std::path::PathBuf>, name: String) -> anyhow::Result<()> {
    use std::io::{self, Write};

    const USER: &str = "local";

    let (config, path) = lib::config::load_config(config_path)?;
    let engine = lib::tour::engine_from_config(&config, &path)?;

    for m in engine.follow(USER, &name).await {
        println!("< {}\n", m);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }
        let result = engine.respond(USER, input).await;
        for m in &result.messages {
            println!("< {}\n", m);
        }
        if let Some(session) = engine.sessions().get(USER).await {
            if session.stage == lib::dialogue::Stage::End {
                println!("(tour complete after {} message(s))", session.turns);
                break;
            }
        }
    }

    Ok(())
}
