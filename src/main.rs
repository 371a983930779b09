use anyhow::{Context, Result as AnyhowResult};
use buildview::host::{HostEvent, MemoryHost};
use buildview::services::time_source::TestTimeSource;
use buildview::services::{log_dirs, tracing_setup};
use buildview::settings::{MemorySettingsStore, ScrollMode, SettingsStore, ENABLED, SCROLL};
use buildview::{EventDispatcher, MirrorConfig};
use clap::Parser;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Replay a build log through the output mirror
///
/// The log is appended in chunks to an in-memory output panel, as a running
/// build would, and the mirrored surface is printed once the replay settles.
#[derive(Parser, Debug)]
#[command(name = "buildview")]
#[command(about = "Mirror a growing build output into an editable surface", long_about = None)]
#[command(version)]
struct Args {
    /// Build log to replay
    #[arg(value_name = "INPUT", required_unless_present = "print_schema")]
    input: Option<PathBuf>,

    /// Number of characters appended per modification
    #[arg(long, value_name = "CHARS", default_value = "64")]
    chunk_size: NonZeroUsize,

    /// Milliseconds between two appended chunks
    #[arg(long, value_name = "MS", default_value = "10")]
    interval: u64,

    /// Path to the mirror configuration file (JSON)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to a settings file, a flat JSON object such as
    /// {"buildview.scroll": "top"}
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Scroll follow mode: bottom, top or last
    #[arg(long, value_name = "MODE", value_parser = parse_scroll_mode)]
    scroll: Option<ScrollMode>,

    /// Start with mirroring disabled
    #[arg(long)]
    disabled: bool,

    /// Path to log file for diagnostics, "-" for stderr
    /// (default: $XDG_STATE_HOME/buildview/logs)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Print the JSON Schema of the configuration file and exit
    #[arg(long)]
    print_schema: bool,
}

fn parse_scroll_mode(value: &str) -> Result<ScrollMode, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown scroll mode '{}' (expected bottom, top or last)", value))
}

fn init_logging(log_file: Option<&Path>) {
    match log_file {
        Some(path) if path == Path::new("-") => {
            tracing_setup::init_stderr();
        }
        Some(path) => {
            tracing_setup::init_global(path);
        }
        None => {
            tracing_setup::init_global(&log_dirs::main_log_path());
            log_dirs::cleanup_stale_logs();
        }
    }
}

fn load_config(path: Option<&Path>) -> AnyhowResult<MirrorConfig> {
    match path {
        Some(path) => MirrorConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(MirrorConfig::default()),
    }
}

fn load_settings(args: &Args, namespace: &str) -> AnyhowResult<MemorySettingsStore> {
    let mut store = match &args.settings {
        Some(path) => MemorySettingsStore::load_from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => MemorySettingsStore::new(),
    };

    if let Some(mode) = args.scroll {
        let value = serde_json::to_value(mode).context("Failed to encode scroll mode")?;
        store.set(&format!("{}.{}", namespace, SCROLL), value);
    }
    if args.disabled {
        store.set(&format!("{}.{}", namespace, ENABLED), serde_json::Value::Bool(false));
    }
    Ok(store)
}

fn main() -> AnyhowResult<()> {
    let args = Args::parse();

    if args.print_schema {
        let schema = MirrorConfig::json_schema().context("Failed to generate schema")?;
        println!("{}", schema);
        return Ok(());
    }

    init_logging(args.log_file.as_deref());

    let config = load_config(args.config.as_deref())?;
    let store = load_settings(&args, &config.settings_namespace)?;

    let Some(input) = &args.input else {
        anyhow::bail!("No input file given");
    };
    let log = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let mut host = MemoryHost::new(1);
    let launcher = host.open_surface(0, "");
    let source = host.open_panel();

    let clock = TestTimeSource::shared();
    let mut dispatcher = EventDispatcher::new(config, Box::new(store), clock.clone());

    tracing::info!("Replaying {} ({} bytes)", input.display(), log.len());
    dispatcher.handle(
        &mut host,
        HostEvent::BuildLaunched {
            source,
            launched_from: launcher,
        },
    );

    let chars: Vec<char> = log.chars().collect();
    let interval = Duration::from_millis(args.interval);
    for chunk in chars.chunks(args.chunk_size.get()) {
        let text: String = chunk.iter().collect();
        host.append(source, &text)
            .context("Source panel closed during replay")?;
        dispatcher.handle(&mut host, HostEvent::Modified { surface: source });

        clock.advance(interval);
        dispatcher.run_due_tasks(&mut host);
    }

    // Let every deferred task run
    while let Some(due_in) = dispatcher.scheduler().next_due_in() {
        clock.advance(due_in);
        dispatcher.run_due_tasks(&mut host);
    }

    let output = dispatcher
        .session(source)
        .and_then(|session| session.output())
        .and_then(|output| host.text(output))
        .context("No output surface was created")?;
    print!("{}", output);

    tracing::info!("Replay finished after {:?} of simulated time", clock.elapsed());
    Ok(())
}
