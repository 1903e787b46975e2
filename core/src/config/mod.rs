mod load;
mod types;

pub use load::{get_relaylog_data_dir, load_default, load_from_path};
pub use types::{
    AppConfig, CollectorConfig, DeliveryConfig, LoggingConfig, RecordConfig, ShutdownConfig,
};
