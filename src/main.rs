use anyhow::{Context, Result};
use clap::Parser;

use nimbus_core::Config;
use nimbus_ui::{AppServices, ScreenState, WeatherModel};

/// Nimbus - current weather for your location or a city
#[derive(Parser, Debug)]
#[command(name = "nimbus")]
#[command(about = "Current weather for your location or a city")]
struct Args {
    /// City to show instead of the current location
    #[arg(long, short)]
    city: Option<String>,

    /// Follow live location updates
    #[arg(long, short)]
    track: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    nimbus_core::init()?;

    let (config, _) = Config::load_validated().context("Failed to load configuration")?;
    tracing::info!("Config directory: {}", config.config_dir.display());

    let services = AppServices::new(&config)?;
    let model = services.weather_model()?;

    tracing::info!("Nimbus started");
    let result = services.runtime().block_on(run(&model, &args));

    // Graceful shutdown
    model.shutdown();
    services.runtime().block_on(model.closed());
    services.shutdown();

    result
}

async fn run(model: &WeatherModel, args: &Args) -> Result<()> {
    let mut states = model.subscribe();

    match &args.city {
        Some(city) => {
            model.search_weather_by_city(city);
            model.start_auto_refresh();
        }
        None => model.initialize(),
    }
    if args.track {
        model.request_location_tracking();
    }
    render(&states.borrow_and_update());

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                render(&states.borrow_and_update());
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn render(state: &ScreenState) {
    match state {
        ScreenState::Default => {}
        ScreenState::Loading => println!("Loading weather..."),
        ScreenState::Error(message) => eprintln!("Error: {}", message),
        ScreenState::Success(s) => {
            let star = if s.is_favorite { " *" } else { "" };
            let place = if s.country.is_empty() {
                s.place_name.clone()
            } else {
                format!("{}, {}", s.place_name, s.country)
            };
            println!("{}{}", place, star);
            println!(
                "  {:.1}° ({:.1}° to {:.1}°), feels like {:.1}°, {}",
                s.temperature, s.temp_min, s.temp_max, s.feels_like, s.description
            );
            println!(
                "  humidity {}%, pressure {} hPa, wind {:.1} at {}°, clouds {}%",
                s.humidity, s.pressure, s.wind_speed, s.wind_direction, s.cloudiness
            );
            if let (Some(rise), Some(set)) = (s.sunrise_local(), s.sunset_local()) {
                println!(
                    "  sunrise {}, sunset {}",
                    rise.format("%H:%M"),
                    set.format("%H:%M")
                );
            }
        }
    }
}
