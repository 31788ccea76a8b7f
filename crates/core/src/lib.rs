pub mod catalog;
pub mod device;
pub mod error;
pub mod files;
pub mod model;
pub mod run;
pub mod scan;
pub mod select;
pub mod sync;

pub use catalog::Catalog;
pub use device::{get_device_data, DeviceProbe, SysinfoProbe};
pub use error::{Error, Result};
pub use files::{FileOps, LiveFileOps, NullFileOps};
pub use model::{
    DeviceSnapshot, MediaKind, MediaUnit, OpAction, OpFailure, SyncReport, SyncStrategy,
};
pub use run::{run_sync, run_sync_with, FreeTarget, KeepTarget, SyncOptions};
pub use scan::{is_media_path, Scanner, MEDIA_EXTENSIONS};
pub use select::{keep_media, select_media};
pub use sync::{plan_sync, run_mixed, run_sequential, SyncPlan};
