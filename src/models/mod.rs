pub mod booking;
pub mod lock;
pub mod package;
pub mod reference;
pub mod session;
pub mod slot;
pub mod user;

pub use booking::{
    BookedSlot, BookingConfirmation, BookingFilter, BookingRecord, BookingStatus,
    CreateBookingRequest, CustomerDetails, Instructor, Page,
};
pub use lock::{format_remaining, LockGrant, ReservationLock};
pub use package::{Billing, Package, PackageRules};
pub use reference::{DateAvailability, Holiday, NewHoliday, Suburb, TestingCenter};
pub use session::BookingStep;
pub use slot::{SelectedSlot, TimeSlot};
pub use user::{LoginResponse, Role, User};
