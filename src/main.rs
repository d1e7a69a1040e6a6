mod app;
mod color;
mod state;
mod ui;

use app::DashboardApp;
use clap::Parser;
use eframe::egui;

use covid_dashboard::config::StoreArgs;

/// Interactive dashboard over a loaded COVID-19 collection.
#[derive(Debug, Parser)]
#[command(name = "covid-dashboard", version)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,
}

fn main() -> eframe::Result {
    env_logger::init();
    let cli = Cli::parse();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 900.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "COVID-19 Dashboard",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            Ok(Box::new(DashboardApp::new(&cli.store)))
        }),
    )
}
