use eframe::egui::{self, Color32, RichText, Ui};

use crate::state::{AppState, ChartState, FilteredChart};
use crate::ui::plot;

const CARD_FILL: Color32 = Color32::from_rgb(51, 51, 51);

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top bar: store status.
pub fn top_bar(ui: &mut Ui, state: &AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.strong("COVID-19 Dashboard");
        ui.separator();

        if let Some(q) = &state.queries {
            ui.label(format!("collection: {}", q.collection().name()));
            ui.separator();
            ui.label(format!(
                "{} continents",
                state.continent_options.len().saturating_sub(1)
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Chart cards
// ---------------------------------------------------------------------------

fn card(ui: &mut Ui, title: &str, add_contents: impl FnOnce(&mut Ui)) {
    egui::Frame::group(ui.style())
        .fill(CARD_FILL)
        .show(ui, |ui: &mut Ui| {
            ui.set_width(ui.available_width());
            ui.heading(title);
            add_contents(ui);
        });
    ui.add_space(12.0);
}

/// Error and empty-result notes shown above a chart.
fn chart_notes<R>(ui: &mut Ui, chart: &ChartState<R>) {
    if let Some(err) = &chart.error {
        ui.label(RichText::new(format!("Query failed: {err}")).color(Color32::RED));
    } else if chart.rows.is_empty() {
        ui.label(RichText::new(format!("No data for {}", chart.filter)).italics());
    }
}

fn continent_selector(ui: &mut Ui, state: &mut AppState, chart: FilteredChart) {
    let selected = state.filter(chart).label().to_string();
    let mut choice: Option<String> = None;

    egui::ComboBox::from_id_salt(chart_id(chart))
        .selected_text(&selected)
        .width(220.0)
        .show_ui(ui, |ui: &mut Ui| {
            for option in &state.continent_options {
                if ui.selectable_label(selected == *option, option).clicked() {
                    choice = Some(option.clone());
                }
            }
        });

    if let Some(continent) = choice {
        state.select_continent(chart, &continent);
    }
}

fn chart_id(chart: FilteredChart) -> &'static str {
    match chart {
        FilteredChart::DailyCases => "daily_cases",
        FilteredChart::LatestDeaths => "latest_deaths",
        FilteredChart::PeopleVaccinated => "people_vaccinated",
    }
}

/// Render all five cards.
pub fn dashboard(ui: &mut Ui, state: &mut AppState) {
    card(ui, "Total COVID-19 Cases Over Time", |ui: &mut Ui| {
        chart_notes(ui, &state.daily_cases);
        let chart = &state.daily_cases;
        plot::series_plot(
            ui,
            chart_id(FilteredChart::DailyCases),
            "New cases",
            &chart.rows,
            &chart.colors,
            |r| (r.location.as_str(), r.date, r.total_cases),
        );
        continent_selector(ui, state, FilteredChart::DailyCases);
    });

    card(ui, "Latest Total Deaths by Country", |ui: &mut Ui| {
        chart_notes(ui, &state.latest_deaths);
        let bars = state
            .latest_deaths
            .rows
            .iter()
            .map(|r| (r.country.clone(), r.total_deaths))
            .collect();
        plot::bar_plot(ui, chart_id(FilteredChart::LatestDeaths), "Total deaths", bars);
        continent_selector(ui, state, FilteredChart::LatestDeaths);
    });

    card(ui, "People Vaccinated Over Time", |ui: &mut Ui| {
        chart_notes(ui, &state.people_vaccinated);
        let chart = &state.people_vaccinated;
        plot::series_plot(
            ui,
            chart_id(FilteredChart::PeopleVaccinated),
            "People vaccinated",
            &chart.rows,
            &chart.colors,
            |r| (r.location.as_str(), r.date, r.people_vaccinated),
        );
        continent_selector(ui, state, FilteredChart::PeopleVaccinated);
    });

    card(ui, "Top 10 Countries by Total Cases", |ui: &mut Ui| {
        chart_notes(ui, &state.top_countries);
        let bars = state
            .top_countries
            .rows
            .iter()
            .map(|r| (r.country.clone(), r.total_cases))
            .collect();
        plot::bar_plot(ui, "top_countries", "Total cases", bars);
    });

    card(ui, "Average Life Expectancy by Continent", |ui: &mut Ui| {
        chart_notes(ui, &state.life_expectancy);
        let bars = state
            .life_expectancy
            .rows
            .iter()
            .map(|r| (r.continent.clone(), Some(r.average_life_expectancy)))
            .collect();
        plot::bar_plot(ui, "life_expectancy", "Years", bars);
    });
}
