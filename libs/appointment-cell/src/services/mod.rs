pub mod availability;
pub mod booking;
pub mod lifecycle;
pub mod notification;
pub mod store;
pub mod supabase_store;

pub use availability::AvailabilityService;
pub use booking::AppointmentBookingService;
pub use lifecycle::{AppointmentLifecycleService, CancellationWorkflow, LifecycleAction};
pub use notification::{
    AppointmentNotification, ChannelNotifier, NotificationDispatcher, NotificationError,
    NotificationEvent, TracingNotifier,
};
pub use store::{BookingStore, BookingStoreError, InMemoryBookingStore};
pub use supabase_store::SupabaseBookingStore;
