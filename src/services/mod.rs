pub mod email_service;
pub mod gemini;
pub mod handshake;
pub mod image_service;
pub mod itinerary_service;
pub mod ledger;
pub mod qualifier;
pub mod trip_service;
pub mod user_service;
