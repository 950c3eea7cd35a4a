pub mod career;
pub mod certificate;
pub mod content_kind;
pub mod email_settings;
pub mod newsletter;
pub mod project;
pub mod skill;
pub mod subscriber;

pub use career::Career;
pub use certificate::Certificate;
pub use content_kind::ContentKind;
pub use email_settings::EmailSettings;
pub use newsletter::{DeliveryStatus, DispatchStatus, Newsletter, NewsletterDelivery};
pub use project::Project;
pub use skill::Skill;
pub use subscriber::{Preferences, PreferencesUpdate, Subscriber, SubscriberRow};
