//! Economic calendar source.
//!
//! Calendar scraping lives outside this service; the bridge ships a fixed
//! schedule dated to the current day so the endpoint is always populated.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use super::provider::{EventSource, ProviderError};
use super::EconomicEvent;

/// `(time, country, event, actual, forecast, impact)`
const SCHEDULE: &[(&str, &str, &str, &str, &str, &str)] = &[
    ("09:30", "CN", "Manufacturing PMI", "50.1", "50.0", "Medium"),
    ("10:00", "CN", "Caixin Services PMI", "52.7", "52.5", "Low"),
    ("14:30", "USA", "CPI Data Release", "3.2%", "3.1%", "High"),
    ("16:00", "USA", "Crude Oil Inventories", "-2.1M", "-1.5M", "Medium"),
    ("20:00", "USA", "FOMC Interest Rate Decision", "5.50%", "5.50%", "High"),
];

/// Fixed daily schedule.
#[derive(Debug, Clone, Default)]
pub struct StaticCalendar {
    /// Pin the date; `None` means today (UTC)
    date: Option<NaiveDate>,
}

impl StaticCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(date: NaiveDate) -> Self {
        Self { date: Some(date) }
    }
}

#[async_trait]
impl EventSource for StaticCalendar {
    fn name(&self) -> &'static str {
        "static-calendar"
    }

    async fn events(&self) -> Result<Vec<EconomicEvent>, ProviderError> {
        let date = self
            .date
            .unwrap_or_else(|| Utc::now().date_naive())
            .format("%Y-%m-%d")
            .to_string();

        Ok(SCHEDULE
            .iter()
            .map(|(time, country, event, actual, forecast, impact)| EconomicEvent {
                date: date.clone(),
                time: time.to_string(),
                country: country.to_string(),
                event: event.to_string(),
                actual: actual.to_string(),
                forecast: forecast.to_string(),
                impact: impact.to_string(),
            })
            .collect())
    }
}
