//! Showroom - interactive 3D scene configurator.
//!
//! Loads an environment map, a model and its texture channels in the
//! background, applies the material layers, and renders the scene through a
//! base pass plus bloom. Rotation, speed and playback can be edited live and
//! shared as a link:
//!
//! ```text
//! showroom "showroom://scene?rotation=90&speed=0.02&isAnimating=0"
//! ```
//!
//! `showroom --write-config` writes the effective configuration to the
//! config path (`SHOWROOM_CONFIG` or `showroom.json`) and exits.

mod animation;
mod app;
mod assets;
mod config;
mod configurator;
mod material;
mod params;
mod render;
mod scene;
mod ui;

use config::Config;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let path = Config::default_path();
    let config = match Config::load_or_default(&path) {
        Ok(config) => config,
        Err(err) => {
            log::error!("Config {}: {}; using defaults", path.display(), err);
            Config::default()
        }
    };

    let arg = std::env::args().nth(1);
    if arg.as_deref() == Some("--write-config") {
        match config::save_config_to_file(&config, &path) {
            Ok(()) => log::info!("Wrote {}", path.display()),
            Err(err) => {
                log::error!("Config {}: {}", path.display(), err);
                std::process::exit(1);
            }
        }
        return;
    }
    let query = arg.and_then(|link| params::share::query_from_link(&link));

    log::info!("Showroom starting");
    log::info!("   Space play/pause, arrows rotate/speed, S share, 1-6 re-apply maps, Esc quits");

    if let Err(err) = app::run(config, query) {
        log::error!("{}", err);
        std::process::exit(1);
    }
    log::info!("Goodbye");
}
