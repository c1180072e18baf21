use crate::services::{email_service::EmailService, image_service::ImageService};

/// Everything a request handler talks to, constructed once per process.
pub struct AppState<S, G> {
    pub store: S,
    pub ai: G,
    pub images: Option<ImageService>,
    pub mailer: EmailService,
}

impl<S, G> AppState<S, G> {
    pub fn new(store: S, ai: G, images: Option<ImageService>, mailer: EmailService) -> Self {
        Self {
            store,
            ai,
            images,
            mailer,
        }
    }
}
