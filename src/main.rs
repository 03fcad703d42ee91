mod app;
mod config;
mod logging;
mod pages;
mod state;
mod ui;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crossterm::{
    ExecutableCommand,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;

use ht_api::HttpClient;
use ht_base::bridge::StateBridge;
use ht_base::sync::SyncTiming;

use app::App;
use config::{ConfigManager, DEFAULT_BASE_URL, default_config_path};
use pages::Pages;
use state::UiState;

const DEFAULT_APP_NAME: &str = "homoTui";

fn main() -> io::Result<()> {
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = match parse_args(&args) {
        Ok(path) => path.unwrap_or_else(default_config_path),
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Usage: homotui [--config <path>]");
            std::process::exit(2);
        }
    };

    let mut manager = ConfigManager::new(config_path);
    if let Err(e) = manager.load() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    let data_dir = manager.data_dir();
    if let Err(e) = logging::init(&data_dir) {
        eprintln!("{}", e);
    }

    let app_name = std::env::var("APP_NAME").unwrap_or_else(|_| DEFAULT_APP_NAME.to_string());
    let app_version = std::env::var("APP_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());
    log::info!("{} v{} starting (config {})", app_name, app_version, manager.path().display());

    let api = manager.get().api.clone();
    let client = match HttpClient::new(&api.base_url, &api.secret) {
        Ok(client) => client,
        Err(e) => {
            log::warn!("invalid saved endpoint {}: {}; using {}", api.base_url, e, DEFAULT_BASE_URL);
            HttpClient::new(DEFAULT_BASE_URL, &api.secret).map_err(io::Error::other)?
        }
    };
    let client = Arc::new(client);

    install_panic_hook(&data_dir);

    let pages = Pages::new(client.clone(), client, Arc::new(Mutex::new(manager)), StateBridge::new());
    let mut app = App::new(UiState::new(app_name, app_version), pages, SyncTiming::default());

    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    app.start();
    let result = app.run(&mut terminal);
    if !app.shutdown() {
        log::warn!("background tasks still running at exit");
    }

    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;
    log::info!("exiting");
    result
}

/// `--config <path>` is the only option.
fn parse_args(args: &[String]) -> Result<Option<PathBuf>, String> {
    let mut config = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => match iter.next() {
                Some(path) => config = Some(PathBuf::from(path)),
                None => return Err("--config needs a path".to_string()),
            },
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }
    Ok(config)
}

/// Restore the terminal and append the panic to `errors/panic.log`.
fn install_panic_hook(data_dir: &Path) {
    let error_dir = data_dir.join("errors");
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = io::stdout().execute(LeaveAlternateScreen);

        let _ = std::fs::create_dir_all(&error_dir);
        let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let backtrace = std::backtrace::Backtrace::force_capture();
        let msg = format!("[{}] {}\n\n{}\n\n---\n", ts, info, backtrace);
        let _ = std::fs::OpenOptions::new().create(true).append(true).open(error_dir.join("panic.log")).and_then(
            |mut f| {
                use std::io::Write;
                f.write_all(msg.as_bytes())
            },
        );
        log::error!("panic: {}", info);

        default_hook(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn config_flag_takes_a_path() {
        assert_eq!(parse_args(&args(&[])), Ok(None));
        assert_eq!(parse_args(&args(&["--config", "/tmp/c.json"])), Ok(Some(PathBuf::from("/tmp/c.json"))));
        assert!(parse_args(&args(&["--config"])).is_err());
        assert!(parse_args(&args(&["--verbose"])).is_err());
    }
}
