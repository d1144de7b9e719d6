//! Database layer (Firestore).

mod catalog;
pub mod firestore;
mod online;
mod payments;

pub use firestore::FirestoreDb;
pub use online::{GroupDeletion, SessionCompletion};
pub use payments::ConfirmedPayment;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const CREDENTIALS: &str = "credentials";
    /// Email uniqueness index (keyed by url-encoded lowercase email)
    pub const USER_EMAILS: &str = "user_emails";
    pub const COURSES: &str = "courses";
    pub const MODULES: &str = "modules";
    pub const LESSONS: &str = "lessons";
    /// Course access grants (keyed by `{uid}_{course_id}`)
    pub const USER_COURSES: &str = "user_courses";
    pub const TRANSACTIONS: &str = "transactions";
    pub const SYSTEM: &str = "system";
    pub const ONLINE_PACKAGES: &str = "online_packages";
    pub const ONLINE_ENROLLMENTS: &str = "online_enrollments";
    pub const ONLINE_GROUPS: &str = "online_groups";
    pub const ONLINE_SESSIONS: &str = "online_sessions";
}

/// Document ID of the payment counter in the `system` collection.
pub const PAYMENT_COUNTER_DOC: &str = "paymentCounter";
