pub mod action;
pub mod events;
pub mod lot;
pub mod memory;
pub mod repository;
pub mod reservation;

pub use action::{ActionSet, ReservationAction};
pub use events::{EventPublisher, PublishError, ReservationEvent};
pub use lot::{GeoPoint, Lot, Spot};
pub use memory::{MemoryEventSink, MemoryRegistry, MemoryReservations};
pub use repository::{
    LotRepository, ReservationRepository, SpotRepository, StoreError, StoreResult,
    TransitionChange,
};
pub use reservation::{Reservation, ReservationStatus};
