pub mod analysis_service;
pub mod notifier;
pub mod rule_engine;

pub use analysis_service::AnalysisService;
pub use notifier::{LogNotifier, Notification, NotificationEvent, Notifier, WebhookNotifier};
