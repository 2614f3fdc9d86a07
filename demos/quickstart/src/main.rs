//! A minimal kernel app: a service, a named provider, and a controller
//! exercising every parameter binding kind, wired up by `Bootstrap::run` the
//! way `kernel`'s own doc example sketches it.

use kernel::prelude::*;
use tracing::info;

mod controllers;
mod events;
mod services;

use events::Greeted;

#[tokio::main]
async fn main() {
    let app = match Bootstrap::run(Scanner::with_root("quickstart"), "quickstart") {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(e.exit_code());
        }
    };

    app.bus
        .subscribe::<Greeted, _>(|event: &Greeted| {
            info!(name = %event.name, "greeted");
        })
        .expect("bus is freshly built, not yet closed");

    if let Err(e) = app.serve().await {
        eprintln!("{e}");
        std::process::exit(e.exit_code());
    }
}
