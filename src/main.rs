mod cache;
mod cli;
mod config;
mod controller;
mod error;
mod export;
mod fetcher;
mod history;
mod record;
mod ui;

use clap::Parser;
use winit::event_loop::EventLoop;

use crate::cli::Cli;
use crate::config::ViewerConfig;
use crate::controller::ViewerController;
use crate::fetcher::{FetchCompletion, HttpFetcher, ThreadLauncher};
use crate::ui::state::ViewState;
use crate::ui::{App, UserEvent};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let config_path = cli.config_path();

    let mut config = ViewerConfig::load_from(&config_path).unwrap_or_else(|e| {
        log::warn!("{}; continuing with defaults", e);
        ViewerConfig::default()
    });
    cli.apply_to(&mut config);

    let fixes = config.sanitize();
    if fixes.any() {
        log::info!("adjusted invalid settings: {:?}", fixes);
    }
    if cli.save_config || (fixes.download_dir_reset && config_path.exists()) {
        if let Err(e) = config.save_to(&config_path) {
            log::warn!("could not save config: {}", e);
        }
    }
    log::info!(
        "source {} | cache {} | downloads {}",
        config.api_url,
        config.max_cache_size,
        config.download_dir.display()
    );

    let fetcher = match HttpFetcher::new() {
        Ok(f) => f,
        Err(e) => {
            log::error!("Could not create HTTP client: {}", e);
            return;
        }
    };

    let event_loop = EventLoop::<UserEvent>::with_user_event().build().expect("create event loop");
    let proxy = event_loop.create_proxy();

    // Completions hop back onto the event loop thread as user events.
    let sink = move |completion: FetchCompletion| {
        let _ = proxy.send_event(UserEvent::Fetched(completion));
    };
    let launcher = ThreadLauncher::new(fetcher, sink);
    let controller = ViewerController::new(config, launcher);

    let mut app = App::new(ViewState::new(controller, config_path));

    event_loop.run_app(&mut app).expect("run event loop");
}
