pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_alert_file;
pub mod json_result_store;
pub mod log_notifier;
pub mod memory_alert_store;
pub mod text_report;
