use serde::Serialize;

/// Where a booking session currently is in the five-step flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStep {
    Location,
    Package,
    DateTime,
    Details,
    Complete,
}

impl BookingStep {
    pub fn number(&self) -> u8 {
        match self {
            BookingStep::Location => 1,
            BookingStep::Package => 2,
            BookingStep::DateTime => 3,
            BookingStep::Details => 4,
            BookingStep::Complete => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStep::Location => "location",
            BookingStep::Package => "package",
            BookingStep::DateTime => "date_time",
            BookingStep::Details => "details",
            BookingStep::Complete => "complete",
        }
    }

    /// Step reached with the "Back" button, if any.
    pub fn previous(&self) -> Option<BookingStep> {
        match self {
            BookingStep::Package => Some(BookingStep::Location),
            BookingStep::DateTime => Some(BookingStep::Package),
            _ => None,
        }
    }
}
