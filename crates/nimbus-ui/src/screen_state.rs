//! What the weather screen shows.

use nimbus_weather::WeatherSnapshot;

/// Screen state published by [`crate::WeatherModel`].
///
/// Starts as `Default` and never returns to it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScreenState {
    /// Nothing requested yet
    #[default]
    Default,
    Loading,
    Success(WeatherSnapshot),
    /// Human-readable failure text
    Error(String),
}

impl ScreenState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ScreenState::Loading)
    }

    pub fn snapshot(&self) -> Option<&WeatherSnapshot> {
        match self {
            ScreenState::Success(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ScreenState::Error(message) => Some(message),
            _ => None,
        }
    }

    /// Favorite flag of the shown snapshot, `false` outside `Success`
    pub fn is_favorite(&self) -> bool {
        self.snapshot().is_some_and(|s| s.is_favorite)
    }
}
