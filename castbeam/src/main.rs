#[macro_use]
extern crate log;

mod app;
mod appletv;
mod config;
mod encoder;
mod error;
mod static_server;

use app::Controller;
use config::Config;

fn main() {
    env_logger::init();

    let config = match Config::from_args(std::env::args()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(2);
        }
    };

    let controller = Controller::new(config);
    if let Err(err) = controller.run() {
        warn!("castbeam failed: {}", err);
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
