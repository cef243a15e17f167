//! Bundle creation request.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to create a new bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBundle {
    pub customer_email: String,
    pub number_of_seats: usize,
    pub passenger_names: Vec<String>,
    pub show_id: Uuid,
    pub outbound_flight_id: Uuid,
    pub return_flight_id: Uuid,
}

impl NewBundle {
    /// Creates a request with one seat per passenger.
    pub fn for_passengers(
        customer_email: impl Into<String>,
        passenger_names: Vec<String>,
        show_id: Uuid,
        outbound_flight_id: Uuid,
        return_flight_id: Uuid,
    ) -> Self {
        Self {
            customer_email: customer_email.into(),
            number_of_seats: passenger_names.len(),
            passenger_names,
            show_id,
            outbound_flight_id,
            return_flight_id,
        }
    }
}
