use std::sync::Arc;

use crate::{
    auth::TokenService,
    config::AppConfig,
    db::DbPool,
    services::{
        geocode::{Geocoder, GoogleMapsGeocoder, UnconfiguredGeocoder},
        messaging::{LogMailer, LogSms, Mailer, SmsSender},
        notifications::NotificationStore,
        otp::OtpStore,
        ratings::RatingService,
        storage::TripStore,
        sync::SyncService,
        trips::TripService,
        users::UserStore,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub trips: TripService,
    pub sync: SyncService,
    pub ratings: RatingService,
    pub users: UserStore,
    pub notifications: NotificationStore,
    pub tokens: TokenService,
    pub otp: OtpStore,
    pub geocoder: Arc<dyn Geocoder>,
    pub mailer: Arc<dyn Mailer>,
    pub sms: Arc<dyn SmsSender>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DbPool,
        geocoder: Arc<dyn Geocoder>,
        mailer: Arc<dyn Mailer>,
        sms: Arc<dyn SmsSender>,
    ) -> Self {
        let store = TripStore::new(db.clone());
        let trips = TripService::new(store.clone(), geocoder.clone());
        let sync = SyncService::new(trips.clone());
        let ratings = RatingService::new(trips.clone(), store);
        let tokens = TokenService::new(
            db.clone(),
            &config.jwt_secret,
            config.access_token_ttl,
            config.refresh_token_ttl,
        );
        let otp = OtpStore::new(config.otp_ttl);
        Self {
            users: UserStore::new(db.clone()),
            notifications: NotificationStore::new(db.clone()),
            config,
            db,
            trips,
            sync,
            ratings,
            tokens,
            otp,
            geocoder,
            mailer,
            sms,
        }
    }

    /// Wires the production collaborators from configuration.
    pub fn from_config(config: AppConfig, db: DbPool) -> Self {
        let geocoder: Arc<dyn Geocoder> = match &config.google_maps_api_key {
            Some(key) => Arc::new(GoogleMapsGeocoder::new(key.clone())),
            None => {
                tracing::warn!("GOOGLE_MAPS_API_KEY not set: geocoding is disabled");
                Arc::new(UnconfiguredGeocoder)
            }
        };
        Self::new(config, db, geocoder, Arc::new(LogMailer), Arc::new(LogSms))
    }
}
