pub mod appointments;
pub mod availability;
pub mod conflict;
pub mod schedule;
pub mod slots;
pub mod timeline;

pub use appointments::AppointmentLookup;
pub use availability::AvailabilityService;
pub use conflict::SlotConflictService;
pub use schedule::ScheduleService;
pub use timeline::ScheduleOverviewService;
