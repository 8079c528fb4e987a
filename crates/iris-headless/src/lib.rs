pub mod chromium;
pub mod driver;

pub use chromium::{encode_screenshot, BrowserPool, ChromiumDriver, LauncherConfig, PageCheckout};
pub use driver::{DriverError, NavigationOutcome, PageDriver};
