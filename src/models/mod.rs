//! Data models for the circulation server

pub mod author;
pub mod book;
pub mod book_copy;
pub mod category;
pub mod checkout;
pub mod claims;
pub mod patron;
pub mod publisher;
pub mod wait_list;

// Re-export commonly used types
pub use author::Author;
pub use book::{Book, BookPage, BookSnapshot, PageRequest};
pub use book_copy::BookCopy;
pub use category::Category;
pub use checkout::{Checkout, CheckoutState};
pub use claims::{Actor, Role, UserClaims};
pub use patron::{CardNumber, PatronAccount};
pub use publisher::Publisher;
pub use wait_list::{NotificationPayload, WaitList};
