pub mod app_config;
pub mod database;
pub mod events;
pub mod reservation_repo;
pub mod retry;
pub mod spot_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use events::EventProducer;
pub use reservation_repo::StoreReservationRepository;
pub use spot_repo::{StoreLotRepository, StoreSpotRepository};
