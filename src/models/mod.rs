pub mod activity;
pub mod itinerary;
pub mod trip;
pub mod user;
