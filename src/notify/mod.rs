//! Email notifications
//!
//! - [`policy`] decides who is due a reminder and who hears about a first post
//! - [`Dispatcher`] builds the emails and logs each outcome
//! - [`Notifier`] is the sender: EmailJS in production, a recorder in tests

pub mod dispatch;
pub mod emailjs;
pub mod mock;
pub mod policy;
pub mod traits;

pub use dispatch::{Dispatcher, FanOutReport};
pub use emailjs::{EmailJsConfig, EmailJsNotifier};
pub use mock::MockNotifier;
pub use traits::{DisabledNotifier, Notification, Notifier, NotifyError, Template};
