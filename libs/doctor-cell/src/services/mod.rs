pub mod resolver;
pub mod schedule;
pub mod slots;
pub mod store;
pub mod supabase_store;

pub use resolver::ScheduleResolver;
pub use schedule::ScheduleService;
pub use slots::{SlotGenerator, SlotIter};
pub use store::{DoctorDirectory, InMemoryScheduleStore, ScheduleStore};
pub use supabase_store::SupabaseScheduleStore;
