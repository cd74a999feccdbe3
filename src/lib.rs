pub mod adapter;
pub mod clock;
pub mod config;
pub mod migrate;
pub mod storage;
pub mod utils;

// Driver modules (point to project root drivers via path attribute) / 驱动模块
#[path = "../drivers/mod.rs"]
pub mod drivers;
