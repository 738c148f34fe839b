use chatpad::config::AppConfig;
use chatpad::console::ConsoleCapability;
use chatpad::controller::{ControllerError, ControllerPool, InputExecutor, LogBackend, TickHandle};
use chatpad::parsing::{
    reverse_parse, reverse_parse_natural, InputParser, MacroTable, ReverseOptions, SequenceResult,
    SharedParser, SynonymTable,
};
use chatpad::validation::{is_valid_pause_duration, validate_button_combos};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

enum Command<'a> {
    Quit,
    Stop,
    Pressed,
    Reload,
    Reverse(&'a str),
    Input(&'a str),
}

impl<'a> Command<'a> {
    fn from_line(line: &'a str) -> Self {
        let trimmed = line.trim();
        match trimmed {
            "!quit" => Command::Quit,
            "!stop" => Command::Stop,
            "!pressed" => Command::Pressed,
            "!reload" => Command::Reload,
            _ => match trimmed.strip_prefix("!reverse") {
                Some(text) => Command::Reverse(text.trim()),
                None => Command::Input(line),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load_or_create(&config_path).await?;

    let console = Arc::new(config.console.capability(&config.custom_console));
    let parser = SharedParser::new(build_parser(&config, console.clone()));
    let pool = Arc::new(ControllerPool::new(config.parser.max_port));
    let executor = InputExecutor::new(pool.clone(), console.clone());
    let tick = TickHandle::spawn(pool.clone(), Arc::new(LogBackend), Some(config.tick.clone()));

    info!(
        "Ready: {} with {} ports, reading commands from stdin",
        console.kind(),
        pool.len()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| eyre!("Failed to read stdin: {}", e))?
    {
        match Command::from_line(&line) {
            Command::Quit => break,
            Command::Stop => executor.cancel_running(),
            Command::Pressed => {
                for controller in pool.iter() {
                    let tracker = controller.tracker();
                    let pressed = tracker.get_pressed_inputs();
                    if pressed.is_empty() {
                        println!("Port {}: nothing pressed", tracker.port() + 1);
                    } else {
                        println!("Port {}: {}", tracker.port() + 1, pressed.join(", "));
                    }
                }
            }
            Command::Reload => match AppConfig::load_or_create(&config_path).await {
                Ok(reloaded) => {
                    config = reloaded.reloaded_onto(&config);
                    parser.swap(build_parser(&config, console.clone()));
                    println!("Reloaded {} macros", config.macros.len());
                }
                Err(e) => error!("Failed to reload config: {}", e),
            },
            Command::Reverse(text) => {
                let parser = parser.load();
                let sequence = parser.parse(text);
                println!(
                    "{}",
                    reverse_parse(
                        &sequence,
                        parser.console(),
                        parser.settings(),
                        ReverseOptions::default()
                    )
                );
                println!("{}", reverse_parse_natural(&sequence, parser.console()));
            }
            Command::Input(text) => {
                handle_input(text, &parser.load(), &config, &pool, &executor);
            }
        }
    }

    info!("Shutting down");
    executor.cancel_running();
    pool.reset_all();
    tick.shutdown()
        .await
        .map_err(|e| eyre!("Failed to stop device tick: {}", e))?;
    Ok(())
}

fn build_parser(config: &AppConfig, console: Arc<ConsoleCapability>) -> InputParser {
    InputParser::new(
        Arc::new(MacroTable::new(config.macros.clone())),
        &SynonymTable::new(config.synonyms.clone()),
        console,
        config.parser.clone(),
    )
}

fn handle_input(
    text: &str,
    parser: &InputParser,
    config: &AppConfig,
    pool: &ControllerPool,
    executor: &InputExecutor,
) {
    let sequence = parser.parse(text);
    match sequence.result {
        SequenceResult::NormalMessage => debug!("Not a command: {}", text),
        SequenceResult::Invalid => println!("{}", sequence.error),
        SequenceResult::Valid => {
            let groups = sequence.groups();
            let restrictions = &config.restrictions;

            if !validate_button_combos(groups, &restrictions.invalid_combo, pool) {
                println!(
                    "Invalid input: presses the restricted combo {}",
                    restrictions.invalid_combo.join("+")
                );
                return;
            }
            if let (Some(pause), Some(max_ms)) =
                (&restrictions.pause_input, restrictions.max_pause_duration_ms)
            {
                if !is_valid_pause_duration(groups, pause, max_ms) {
                    println!("Invalid input: \"{}\" is held longer than {}ms", pause, max_ms);
                    return;
                }
            }

            match executor.carry_out(groups.to_vec()) {
                Ok(_) => info!(
                    "Executing {} groups over {}ms",
                    groups.len(),
                    sequence.total_duration_ms
                ),
                Err(e) => error!("{}", ControllerError::from(e)),
            }
        }
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
