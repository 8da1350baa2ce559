pub mod admin;
pub mod appointment;
pub mod feedback;
pub mod reschedule;
