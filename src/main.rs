//! CLI entry point for `mailfwd`.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};

use mailfwd::compose::{self, Envelope};
use mailfwd::config::{self, Config};
use mailfwd::i18n::{self, Lang};
use mailfwd::model::mail::RawMessage;
use mailfwd::parser::message::decode_message;
use mailfwd::pipeline::Forwarder;
use mailfwd::relay::{Relay, RelayError, SendRequest, SmtpRelay};
use mailfwd::store::FsBlobStore;

#[derive(Parser)]
#[command(name = "mailfwd", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Language (en, de). Defaults to config, then system locale.
    #[arg(long, global = true, value_name = "LANG")]
    lang: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a raw message file
    Decode {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the forwarded message for a raw message file
    Compose {
        file: PathBuf,
        /// Envelope sender, used as Reply-To fallback
        #[arg(long, default_value = "")]
        source: String,
        /// Envelope recipient, used when the message has no To header
        #[arg(long, default_value = "")]
        destination: String,
        /// Print the HTML body instead of the text body
        #[arg(long)]
        html: bool,
    },
    /// Process a trigger event (file, or stdin when omitted)
    Handle {
        event: Option<PathBuf>,
        /// Print the outbound message instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// Language given with `--lang`, read before clap processes --help.
fn explicit_lang() -> Option<Lang> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--lang" {
            if let Some(lang) = args.get(i + 1).and_then(|code| Lang::from_code(code)) {
                return Some(lang);
            }
        }
        if let Some(code) = args[i].strip_prefix("--lang=") {
            if let Some(lang) = Lang::from_code(code) {
                return Some(lang);
            }
        }
    }
    None
}

/// Build a localized clap Command using i18n strings.
fn build_localized_command(lang: Lang) -> clap::Command {
    let mut cmd = Cli::command().about(lang.app_about());

    let subcommands: Vec<clap::Command> = cmd
        .get_subcommands()
        .map(|sub| {
            let s = sub.clone();
            match s.get_name() {
                "decode" => s.about(lang.help_cmd_decode()),
                "compose" => s.about(lang.help_cmd_compose()),
                "handle" => s.about(lang.help_cmd_handle()),
                "completions" => s.about(lang.help_cmd_completions()),
                "manpage" => s.about(lang.help_cmd_manpage()),
                _ => s,
            }
        })
        .collect();

    for sub in subcommands {
        cmd = cmd.mut_subcommand(sub.get_name(), |_| sub.clone());
    }

    cmd
}

fn main() -> anyhow::Result<()> {
    // Load configuration first so its language can localize --help
    let config = config::load_config();
    let lang = explicit_lang()
        .or_else(|| config.lang())
        .unwrap_or_else(i18n::detect_system_lang);
    i18n::set_lang(lang);

    let matches = build_localized_command(lang).get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    if let Some(code) = cli.lang.as_deref() {
        if Lang::from_code(code).is_none() {
            tracing::warn!(lang = code, "Unsupported language, using {}", lang.code());
        }
    }

    match cli.command {
        Commands::Decode { file, json } => cmd_decode(&file, json),
        Commands::Compose {
            file,
            source,
            destination,
            html,
        } => cmd_compose(&file, &source, &destination, html, &config),
        Commands::Handle { event, dry_run } => cmd_handle(event.as_deref(), dry_run, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailfwd.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailfwd", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn read_raw_message(path: &Path) -> anyhow::Result<RawMessage> {
    if !path.exists() {
        anyhow::bail!("{}: {}", i18n::lang().err_file_not_found(), path.display());
    }
    let bytes = std::fs::read(path)?;
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(RawMessage::new(id, bytes))
}

/// Decode a raw message file and print headers and body.
fn cmd_decode(path: &Path, json: bool) -> anyhow::Result<()> {
    let raw = read_raw_message(path)?;
    let decoded = decode_message(&raw);

    if json {
        let anomalies: Vec<String> = decoded.anomalies.iter().map(ToString::to_string).collect();
        let out = serde_json::json!({
            "file": path.to_string_lossy(),
            "message": decoded.value,
            "anomalies": anomalies,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let lang = i18n::lang();
    let message = &decoded.value;
    println!("  {:<10} {}", lang.label_subject(), message.subject);
    println!("  {:<10} {}", lang.label_from(), message.from);
    println!("  {:<10} {}", lang.label_to(), message.to);
    println!("  {:<10} {}", lang.label_date(), message.date);
    println!();
    println!("{}", message.body_text);

    if !decoded.anomalies.is_empty() {
        eprintln!();
        eprintln!("  {} ({}):", lang.msg_anomalies(), decoded.anomalies.len());
        for anomaly in &decoded.anomalies {
            eprintln!("    - {anomaly}");
        }
    }
    Ok(())
}

/// Print the forwarded copy of a raw message file without sending it.
fn cmd_compose(
    path: &Path,
    source: &str,
    destination: &str,
    html: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let raw = read_raw_message(path)?;
    let message = decode_message(&raw).value;
    let envelope = Envelope {
        source,
        destination,
        received_at: None,
    };
    let request = compose::compose(
        &message,
        &raw,
        &envelope,
        &config.forward_settings(i18n::lang()),
    );

    println!("Subject: {}", request.subject);
    println!("Reply-To: {}", request.reply_to);
    println!();
    if html {
        println!("{}", request.html_body);
    } else {
        println!("{}", request.text_body);
    }
    Ok(())
}

/// Prints the outbound message as JSON instead of sending it.
struct DryRunRelay;

impl Relay for DryRunRelay {
    fn send(&self, request: &SendRequest) -> Result<String, RelayError> {
        let json =
            serde_json::to_string_pretty(request).map_err(|e| RelayError::Build(e.to_string()))?;
        println!("{json}");
        Ok("dry-run".to_string())
    }
}

/// Process one trigger event and print the result as JSON.
fn cmd_handle(event: Option<&Path>, dry_run: bool, config: &Config) -> anyhow::Result<()> {
    let json = match event {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("{}: {}", i18n::lang().err_file_not_found(), path.display());
            }
            std::fs::read_to_string(path)?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let relay: Box<dyn Relay> = if dry_run {
        Box::new(DryRunRelay)
    } else {
        Box::new(SmtpRelay::new(&config.relay)?)
    };
    let forwarder = Forwarder::new(
        FsBlobStore::new(&config.storage.root),
        relay,
        config.forward_settings(i18n::lang()),
    )
    .with_default_location(&config.storage.default_bucket, &config.storage.key_prefix);

    let outcome = match forwarder.handle_json(&json) {
        Err(e) if e.is_blob_fetch() => {
            tracing::error!(error = %e, "Stored message unavailable, nothing forwarded");
            return Err(e.into());
        }
        other => other?,
    };
    match outcome {
        Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        None => eprintln!("{}", i18n::lang().msg_no_event()),
    }
    Ok(())
}
