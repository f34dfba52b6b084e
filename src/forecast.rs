//! Multi-day forecast for a single address

use std::time::Duration;

use tracing::{info, instrument};

use crate::geocoding::resolve_location;
use crate::models::{DailyWeatherReport, LocationInput};
use crate::pipeline::{Providers, with_deadline};
use crate::{CommuteSenseError, Result};

/// Longest daily forecast offered
pub const MAX_FORECAST_DAYS: u8 = 7;

pub struct DailyForecastService {
    providers: Providers,
    request_timeout: Duration,
}

impl DailyForecastService {
    pub fn new(providers: Providers, request_timeout: Duration) -> Self {
        Self {
            providers,
            request_timeout,
        }
    }

    /// Forecast for `address` over `days` days, starting today
    #[instrument(skip(self))]
    pub async fn report(&self, address: &str, days: u8) -> Result<DailyWeatherReport> {
        if !(1..=MAX_FORECAST_DAYS).contains(&days) {
            return Err(CommuteSenseError::input(format!(
                "Days must be between 1 and {MAX_FORECAST_DAYS}, got: {days}"
            )));
        }
        let input = LocationInput::parse(address)?;

        with_deadline(self.request_timeout, async {
            let location = resolve_location(self.providers.geocoder.as_ref(), &input).await?;
            let forecast = self.providers.weather.daily(location.coordinate, days).await?;
            let description = self
                .providers
                .narrator
                .daily_narrative(&location, &forecast)
                .await?;

            info!(location = %location.label(), days = forecast.len(), "Daily forecast ready");
            Ok(DailyWeatherReport {
                location,
                days: forecast,
                description,
            })
        })
        .await
    }
}
